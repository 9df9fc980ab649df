//! Chain ledger: session-scoped history of recent dispatches

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{GuardCall, LoopGuard, Verdict};
use crate::routing::AntiLoop;
use crate::state::StateStore;
use crate::Result;

/// Longest window honoured; larger settings are clamped
const MAX_WINDOW_SECS: u64 = 10 * 365 * 24 * 60 * 60;

pub(crate) fn window(seconds: u64) -> Duration {
    Duration::seconds(seconds.min(MAX_WINDOW_SECS) as i64)
}

/// One recorded dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEntry {
    pub timestamp: DateTime<Utc>,
    pub specialist: String,
}

/// Persisted chain for one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainHistory {
    pub session_id: String,
    #[serde(default)]
    pub chain: Vec<ChainEntry>,
}

impl ChainHistory {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            chain: Vec::new(),
        }
    }

    /// Drop entries at least `cooldown` old
    pub fn prune(&mut self, now: DateTime<Utc>, cooldown: Duration) {
        self.chain.retain(|entry| now - entry.timestamp < cooldown);
    }

    pub fn last(&self) -> Option<&ChainEntry> {
        self.chain.last()
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

/// Caps chained dispatches inside the cooldown window and rejects A→A repeats
pub struct ChainLedger<S> {
    store: S,
    session_id: String,
    limits: AntiLoop,
}

impl<S: StateStore<ChainHistory>> ChainLedger<S> {
    pub fn new(store: S, session_id: impl Into<String>, limits: AntiLoop) -> Self {
        Self {
            store,
            session_id: session_id.into(),
            limits,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn limits(&self) -> AntiLoop {
        self.limits
    }

    fn cooldown(&self) -> Duration {
        window(self.limits.cooldown_seconds)
    }

    /// This session's history, pruned as of `now`
    ///
    /// Unreadable state and history from another session both read as empty.
    pub fn history_at(&self, now: DateTime<Utc>) -> ChainHistory {
        let mut history = match self.store.load() {
            Ok(history) => history,
            Err(e) => {
                info!(error = %e, "Chain history unreadable, treating as empty");
                return ChainHistory::new(&self.session_id);
            }
        };
        if history.session_id != self.session_id {
            return ChainHistory::new(&self.session_id);
        }
        history.prune(now, self.cooldown());
        history
    }

    /// Current pruned history, for diagnostics
    pub fn status(&self) -> ChainHistory {
        self.history_at(Utc::now())
    }

    /// Whether `specialist` may be dispatched now
    pub fn check_depth(&self, specialist: &str) -> Verdict {
        self.check_depth_at(specialist, Utc::now())
    }

    pub fn check_depth_at(&self, specialist: &str, now: DateTime<Utc>) -> Verdict {
        let history = self.history_at(now);

        if history.len() >= self.limits.max_chain_depth as usize {
            return Verdict::block(format!(
                "max chain depth exceeded ({}/{} dispatches within {}s)",
                history.len(),
                self.limits.max_chain_depth,
                self.limits.cooldown_seconds
            ));
        }
        if let Some(last) = history.last() {
            if last.specialist == specialist {
                return Verdict::block(format!(
                    "immediate loop detected ({} -> {})",
                    last.specialist, specialist
                ));
            }
        }
        Verdict::allow()
    }

    /// Append a dispatch of `specialist` to the chain
    pub fn record(&self, specialist: &str) -> Result<()> {
        self.record_at(specialist, Utc::now())
    }

    pub fn record_at(&self, specialist: &str, now: DateTime<Utc>) -> Result<()> {
        let cooldown = self.cooldown();
        let depth = self.store.update(|history| {
            if history.session_id != self.session_id {
                *history = ChainHistory::new(&self.session_id);
            }
            history.prune(now, cooldown);
            history.chain.push(ChainEntry {
                timestamp: now,
                specialist: specialist.to_string(),
            });
            history.len()
        })?;
        debug!(specialist, depth, session = %self.session_id, "Chain entry recorded");
        Ok(())
    }

    /// Clear the chain of `session_id`, or unconditionally when `None`
    pub fn reset(&self, session_id: Option<&str>) -> Result<()> {
        self.store.update(|history| {
            if session_id.map_or(true, |id| id == history.session_id) {
                history.chain.clear();
            }
        })
    }
}

impl<S: StateStore<ChainHistory>> LoopGuard for ChainLedger<S> {
    fn name(&self) -> &'static str {
        "chain-ledger"
    }

    fn check(&self, call: &GuardCall<'_>) -> Verdict {
        self.check_depth_at(call.key, call.at)
    }

    fn record(&self, call: &GuardCall<'_>) -> Result<()> {
        self.record_at(call.key, call.at)
    }

    fn reset(&self, key: Option<&str>) -> Result<()> {
        ChainLedger::reset(self, key)
    }
}
