//! Circuit breaker: per-identity recursion depth and call frequency limits
//!
//! Every agent identity keeps its own call history. A check is blocked once
//! the identity has `max_depth` calls inside the depth window, or
//! `max_calls_per_window` calls inside the trailing frequency window. Routing
//! scores play no part here, and identities never affect each other.

use std::collections::BTreeMap;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::chain::window;
use super::{GuardCall, LoopGuard, Verdict};
use crate::state::StateStore;
use crate::{Error, Result};

/// Limits enforced by the circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerLimits {
    /// Calls within `depth_window` at which an identity is blocked
    pub max_depth: u32,
    /// Calls within `frequency_window` at which an identity is blocked
    pub max_calls_per_window: u32,
    #[serde(with = "humantime_serde")]
    pub frequency_window: StdDuration,
    #[serde(with = "humantime_serde")]
    pub depth_window: StdDuration,
}

impl Default for BreakerLimits {
    fn default() -> Self {
        Self {
            max_depth: 5,
            max_calls_per_window: 10,
            frequency_window: StdDuration::from_secs(60),
            depth_window: StdDuration::from_secs(300),
        }
    }
}

impl BreakerLimits {
    /// Reject limits that would switch a rule off or block every call
    pub fn validate(&self) -> Result<()> {
        if self.max_depth < 1 {
            return Err(Error::Settings("breaker.max_depth must be at least 1".into()));
        }
        if self.max_calls_per_window < 1 {
            return Err(Error::Settings(
                "breaker.max_calls_per_window must be at least 1".into(),
            ));
        }
        for (name, value) in [
            ("frequency_window", self.frequency_window),
            ("depth_window", self.depth_window),
        ] {
            if value < StdDuration::from_secs(1) {
                return Err(Error::Settings(format!(
                    "breaker.{} must be at least 1s, got {:?}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    fn frequency_span(&self) -> Duration {
        span(self.frequency_window)
    }

    fn depth_span(&self) -> Duration {
        span(self.depth_window)
    }

    /// Calls older than this no longer affect any rule
    fn retention(&self) -> Duration {
        self.frequency_span().max(self.depth_span())
    }
}

/// Whole seconds, rounded up
fn span(duration: StdDuration) -> Duration {
    let seconds = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    window(seconds)
}

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub parent: Option<String>,
}

/// Call history of one identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    #[serde(default)]
    pub calls: Vec<CallEntry>,
}

impl CallRecord {
    /// Calls younger than `span` as of `now`
    pub fn calls_within(&self, now: DateTime<Utc>, span: Duration) -> usize {
        self.calls
            .iter()
            .filter(|call| now - call.timestamp < span)
            .count()
    }
}

/// Persisted breaker state: identity to call history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BreakerState(pub BTreeMap<String, CallRecord>);

impl BreakerState {
    pub fn record(&self, identity: &str) -> Option<&CallRecord> {
        self.0.get(identity)
    }
}

/// Diagnostics for one identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityStats {
    pub total_calls: usize,
    /// Calls inside the depth window
    pub depth: usize,
    /// Calls inside the frequency window
    pub calls_in_window: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_call: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_parent: Option<String>,
    /// Reason the next check would be blocked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked: Option<String>,
}

/// Active limits and per-identity statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerStatus {
    pub config: BreakerLimits,
    pub stats: BTreeMap<String, IdentityStats>,
}

/// Guards agent identities against runaway recursion and call storms
pub struct CircuitBreaker<S> {
    store: S,
    limits: BreakerLimits,
}

impl<S: StateStore<BreakerState>> CircuitBreaker<S> {
    pub fn new(store: S, limits: BreakerLimits) -> Self {
        Self { store, limits }
    }

    pub fn limits(&self) -> BreakerLimits {
        self.limits
    }

    fn state(&self) -> BreakerState {
        self.store.load().unwrap_or_else(|e| {
            info!(error = %e, "Circuit breaker state unreadable, treating as empty");
            BreakerState::default()
        })
    }

    fn evaluate(&self, identity: &str, record: Option<&CallRecord>, now: DateTime<Utc>) -> Verdict {
        let Some(record) = record else {
            return Verdict::allow();
        };

        let depth = record.calls_within(now, self.limits.depth_span());
        if depth >= self.limits.max_depth as usize {
            return Verdict::block(format!(
                "max recursion depth reached for '{}' ({}/{} calls within {}s)",
                identity,
                depth,
                self.limits.max_depth,
                self.limits.depth_window.as_secs()
            ));
        }

        let frequency = record.calls_within(now, self.limits.frequency_span());
        if frequency >= self.limits.max_calls_per_window as usize {
            return Verdict::block(format!(
                "call frequency limit reached for '{}' ({}/{} calls within {}s)",
                identity,
                frequency,
                self.limits.max_calls_per_window,
                self.limits.frequency_window.as_secs()
            ));
        }

        Verdict::allow()
    }

    /// Whether `identity` may be invoked now
    pub fn check(&self, identity: &str, parent: Option<&str>) -> Verdict {
        self.check_at(identity, parent, Utc::now())
    }

    pub fn check_at(&self, identity: &str, parent: Option<&str>, now: DateTime<Utc>) -> Verdict {
        let state = self.state();
        let verdict = self.evaluate(identity, state.record(identity), now);
        if !verdict.is_allowed() {
            debug!(identity, parent = ?parent, reason = ?verdict.reason(), "Circuit open");
        }
        verdict
    }

    /// Append a call for `identity`, whatever a prior check said
    pub fn record(&self, identity: &str, parent: Option<&str>) -> Result<()> {
        self.record_at(identity, parent, Utc::now())
    }

    pub fn record_at(&self, identity: &str, parent: Option<&str>, now: DateTime<Utc>) -> Result<()> {
        let retention = self.limits.retention();
        self.store.update(|state| {
            let record = state.0.entry(identity.to_string()).or_default();
            record.calls.retain(|call| now - call.timestamp < retention);
            record.calls.push(CallEntry {
                timestamp: now,
                parent: parent.map(str::to_string),
            });
        })?;
        debug!(identity, parent = ?parent, "Circuit breaker call recorded");
        Ok(())
    }

    /// Forget `identity`, or every identity when `None`
    pub fn reset(&self, identity: Option<&str>) -> Result<()> {
        self.store.update(|state| match identity {
            Some(identity) => {
                state.0.remove(identity);
            }
            None => state.0.clear(),
        })
    }

    /// Limits and per-identity statistics, for diagnostics only
    pub fn status(&self) -> BreakerStatus {
        self.status_at(Utc::now())
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> BreakerStatus {
        let state = self.state();
        let stats = state
            .0
            .iter()
            .map(|(identity, record)| {
                let last = record.calls.last();
                let stats = IdentityStats {
                    total_calls: record.calls.len(),
                    depth: record.calls_within(now, self.limits.depth_span()),
                    calls_in_window: record.calls_within(now, self.limits.frequency_span()),
                    last_call: last.map(|call| call.timestamp),
                    last_parent: last.and_then(|call| call.parent.clone()),
                    blocked: self.evaluate(identity, Some(record), now).reason,
                };
                (identity.clone(), stats)
            })
            .collect();
        BreakerStatus {
            config: self.limits,
            stats,
        }
    }
}

impl<S: StateStore<BreakerState>> LoopGuard for CircuitBreaker<S> {
    fn name(&self) -> &'static str {
        "circuit-breaker"
    }

    fn check(&self, call: &GuardCall<'_>) -> Verdict {
        self.check_at(call.key, call.parent, call.at)
    }

    fn record(&self, call: &GuardCall<'_>) -> Result<()> {
        self.record_at(call.key, call.parent, call.at)
    }

    fn reset(&self, key: Option<&str>) -> Result<()> {
        CircuitBreaker::reset(self, key)
    }
}
