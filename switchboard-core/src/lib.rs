//! Switchboard Core - specialist routing and loop prevention for agent hosts
//!
//! This crate decides which specialist handler should process a trigger
//! event, using declarative scoring rules, and keeps runaway or looping
//! invocations in check with a chain ledger and a circuit breaker whose
//! state is shared between independent process invocations.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod guard;
pub mod routing;
pub mod state;

pub use config::{CliOverrides, Settings};
pub use dispatch::{
    dispatch_for_host, open_dispatcher, ChainSuggestion, DispatchPhase, Dispatcher,
    FileDispatcher, Suppressed,
};
pub use error::{Error, Result};
pub use guard::{BreakerLimits, ChainLedger, CircuitBreaker, LoopGuard, Verdict};
pub use routing::{Confidence, RoutingConfig, RoutingDecision, RuleSet, RuleStore, Trigger};
pub use state::{JsonFileStore, MemoryStore, StateStore};
