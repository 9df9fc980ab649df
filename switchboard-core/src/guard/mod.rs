//! Loop-prevention guards
//!
//! Two independent policies protect the host from runaway dispatch:
//! - [`ChainLedger`]: per session, caps how many dispatches may chain inside
//!   the cooldown window and rejects an immediate repeat of the same specialist.
//! - [`CircuitBreaker`]: per agent identity, caps recursion depth and call
//!   frequency.
//!
//! Both keep their history in a [`crate::state::StateStore`] and share the
//! [`LoopGuard`] interface, but they are keyed differently and persisted
//! separately.

mod breaker;
mod chain;

pub use breaker::{
    BreakerLimits, BreakerState, BreakerStatus, CallEntry, CallRecord, CircuitBreaker,
    IdentityStats,
};
pub use chain::{ChainEntry, ChainHistory, ChainLedger};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Outcome of a guard check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Verdict {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

/// A guarded call: who is being invoked, by whom, and when
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardCall<'a> {
    /// Specialist name or agent identity
    pub key: &'a str,
    pub parent: Option<&'a str>,
    pub at: DateTime<Utc>,
}

impl<'a> GuardCall<'a> {
    /// A call happening now
    pub fn new(key: &'a str) -> Self {
        Self {
            key,
            parent: None,
            at: Utc::now(),
        }
    }

    pub fn with_parent(mut self, parent: Option<&'a str>) -> Self {
        self.parent = parent;
        self
    }

    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }
}

/// Common interface of the loop-prevention policies
///
/// `check` must never fail: unreadable state is treated as empty. `record`
/// appends unconditionally; callers check before acting and record after
/// proceeding.
pub trait LoopGuard {
    /// Short policy name used in suppression reasons and logs
    fn name(&self) -> &'static str;

    fn check(&self, call: &GuardCall<'_>) -> Verdict;

    fn record(&self, call: &GuardCall<'_>) -> Result<()>;

    /// Clear history for one key (session or identity), or everything
    fn reset(&self, key: Option<&str>) -> Result<()>;
}
