//! Dispatcher: scores a trigger, picks a specialist and consults both guards
//!
//! The dispatcher owns no state. It reads and writes through the chain ledger
//! and circuit breaker, which in turn go through their [`StateStore`]s.

mod host;
mod phase;

pub use host::{dispatch_for_host, open_dispatcher, FileDispatcher};
pub use phase::{DispatchPhase, DispatchTrace};

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::guard::{
    BreakerLimits, BreakerState, ChainHistory, ChainLedger, CircuitBreaker, GuardCall, LoopGuard,
    Verdict,
};
use crate::routing::{score, select, RoutingDecision, RuleSet, Scores, Trigger};
use crate::state::StateStore;

/// Why a dispatch attempt produced nothing actionable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Suppressed {
    /// No specialist cleared the confidence floor
    NoCandidate,
    /// The chain ledger blocked the winner
    ChainBlocked { specialist: String, reason: String },
    /// The circuit breaker blocked the winner
    CircuitOpen { specialist: String, reason: String },
}

impl Suppressed {
    /// The specialist that would have been dispatched, if any
    pub fn specialist(&self) -> Option<&str> {
        match self {
            Suppressed::NoCandidate => None,
            Suppressed::ChainBlocked { specialist, .. }
            | Suppressed::CircuitOpen { specialist, .. } => Some(specialist),
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Suppressed::NoCandidate => "no specialist reached the confidence threshold",
            Suppressed::ChainBlocked { reason, .. } | Suppressed::CircuitOpen { reason, .. } => {
                reason
            }
        }
    }

    /// True when a decision existed but a guard blocked it
    pub fn is_guard_block(&self) -> bool {
        !matches!(self, Suppressed::NoCandidate)
    }
}

impl fmt::Display for Suppressed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.specialist() {
            Some(specialist) => write!(f, "{} suppressed: {}", specialist, self.reason()),
            None => write!(f, "{}", self.reason()),
        }
    }
}

/// A configured follow-up after a specialist completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSuggestion {
    pub specialist: String,
    pub context_files: Vec<String>,
    /// Chain ledger verdict for dispatching this follow-up now
    pub verdict: Verdict,
}

/// Routes triggers to specialists under both loop-prevention guards
pub struct Dispatcher<C, B> {
    rules: Arc<RuleSet>,
    ledger: ChainLedger<C>,
    breaker: CircuitBreaker<B>,
}

impl<C, B> Dispatcher<C, B>
where
    C: StateStore<ChainHistory>,
    B: StateStore<BreakerState>,
{
    /// Build a dispatcher; the chain ledger takes its limits from `rules`
    pub fn new(
        rules: Arc<RuleSet>,
        chain_store: C,
        breaker_store: B,
        session_id: impl Into<String>,
        breaker_limits: BreakerLimits,
    ) -> Self {
        let ledger = ChainLedger::new(chain_store, session_id, rules.config().anti_loop);
        let breaker = CircuitBreaker::new(breaker_store, breaker_limits);
        Self {
            rules,
            ledger,
            breaker,
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn ledger(&self) -> &ChainLedger<C> {
        &self.ledger
    }

    pub fn breaker(&self) -> &CircuitBreaker<B> {
        &self.breaker
    }

    /// Score a trigger without consulting or touching either guard
    pub fn score(&self, trigger: &Trigger) -> Scores {
        score(trigger, &self.rules)
    }

    /// Route `trigger`, invoked on behalf of `parent` when given
    pub fn dispatch(
        &self,
        trigger: &Trigger,
        parent: Option<&str>,
    ) -> std::result::Result<RoutingDecision, Suppressed> {
        self.dispatch_at(trigger, parent, Utc::now())
    }

    pub fn dispatch_at(
        &self,
        trigger: &Trigger,
        parent: Option<&str>,
        now: DateTime<Utc>,
    ) -> std::result::Result<RoutingDecision, Suppressed> {
        self.dispatch_traced(trigger, parent, now).0
    }

    /// Dispatch and also return the phases the attempt went through
    pub fn dispatch_traced(
        &self,
        trigger: &Trigger,
        parent: Option<&str>,
        now: DateTime<Utc>,
    ) -> (std::result::Result<RoutingDecision, Suppressed>, DispatchTrace) {
        let mut trace = DispatchTrace::start();
        let outcome = self.run(trigger, parent, now, &mut trace);

        match &outcome {
            Ok(decision) => info!(
                specialist = %decision.specialist,
                score = decision.score,
                confidence = %decision.confidence,
                "Specialist dispatched"
            ),
            Err(Suppressed::NoCandidate) => {
                tracing::debug!("No specialist reached the confidence threshold")
            }
            Err(suppressed) => info!(reason = %suppressed, "Dispatch suppressed"),
        }
        (outcome, trace)
    }

    fn run(
        &self,
        trigger: &Trigger,
        parent: Option<&str>,
        now: DateTime<Utc>,
        trace: &mut DispatchTrace,
    ) -> std::result::Result<RoutingDecision, Suppressed> {
        let scores = self.score(trigger);

        let Some(decision) = select(&scores, &self.rules) else {
            step(trace, DispatchPhase::Suppressed);
            return Err(Suppressed::NoCandidate);
        };
        step(trace, DispatchPhase::Selected);

        let call = GuardCall::new(&decision.specialist)
            .with_parent(parent)
            .at(now);

        // Both verdicts reflect history before this attempt
        let chain = LoopGuard::check(&self.ledger, &call);
        let circuit = LoopGuard::check(&self.breaker, &call);

        // The breaker records every selected attempt, whichever guard suppresses it
        if let Err(e) = LoopGuard::record(&self.breaker, &call) {
            warn!(error = %e, identity = %decision.specialist, "Failed to record circuit breaker call");
        }

        if !chain.is_allowed() {
            step(trace, DispatchPhase::Suppressed);
            return Err(Suppressed::ChainBlocked {
                specialist: decision.specialist.clone(),
                reason: chain.reason.unwrap_or_default(),
            });
        }
        step(trace, DispatchPhase::ChainChecked);

        if !circuit.is_allowed() {
            step(trace, DispatchPhase::Suppressed);
            return Err(Suppressed::CircuitOpen {
                specialist: decision.specialist.clone(),
                reason: circuit.reason.unwrap_or_default(),
            });
        }
        step(trace, DispatchPhase::CircuitChecked);

        if let Err(e) = LoopGuard::record(&self.ledger, &call) {
            warn!(error = %e, specialist = %decision.specialist, "Failed to record chain entry");
        }
        step(trace, DispatchPhase::Dispatched);

        Ok(decision)
    }

    /// Follow-ups configured in `chainRules` for a completed specialist
    ///
    /// Unknown names are skipped. Each suggestion carries the chain ledger's
    /// current verdict so the host only chains what is permitted.
    pub fn next_in_chain(&self, completed: &str) -> Vec<ChainSuggestion> {
        self.next_in_chain_at(completed, Utc::now())
    }

    pub fn next_in_chain_at(&self, completed: &str, now: DateTime<Utc>) -> Vec<ChainSuggestion> {
        let config = self.rules.config();
        let Some(next) = config.chain_rules.get(completed) else {
            return Vec::new();
        };

        next.iter()
            .filter_map(|name| match config.specialist(name) {
                Some(rule) => Some(ChainSuggestion {
                    specialist: name.clone(),
                    context_files: rule.context_files.clone(),
                    verdict: self.ledger.check_depth_at(name, now),
                }),
                None => {
                    warn!(specialist = %name, after = completed, "Skipping unknown chain follow-up");
                    None
                }
            })
            .collect()
    }
}

fn step(trace: &mut DispatchTrace, next: DispatchPhase) {
    if let Err(e) = trace.advance(next) {
        warn!(error = %e, "Dispatch phase out of order");
    }
}
