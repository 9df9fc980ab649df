//! Host-facing adapter
//!
//! The host event loop must never be blocked or crashed by routing. This
//! adapter maps every failure to "no decision": a broken routing config gets
//! one error-level diagnostic, everything else is logged and swallowed.

use tracing::{debug, error, warn};

use super::Dispatcher;
use crate::config::Settings;
use crate::guard::{BreakerState, ChainHistory};
use crate::routing::{RoutingDecision, RuleStore, Trigger};
use crate::state::JsonFileStore;
use crate::Result;

/// Dispatcher backed by the shared state files
pub type FileDispatcher = Dispatcher<JsonFileStore<ChainHistory>, JsonFileStore<BreakerState>>;

/// Load the routing rules and open both state files named by `settings`
///
/// Fails only when the routing rules cannot be loaded.
pub fn open_dispatcher(settings: &Settings) -> Result<FileDispatcher> {
    let rules = RuleStore::load(Some(&settings.routing.rules_path))?;
    Ok(Dispatcher::new(
        rules,
        JsonFileStore::new(settings.chain_history_path()),
        JsonFileStore::new(settings.circuit_breaker_path()),
        settings.state.session_id.clone(),
        settings.breaker,
    ))
}

/// Route a trigger for the host; never fails
pub fn dispatch_for_host(
    settings: &Settings,
    trigger: &Trigger,
    parent: Option<&str>,
) -> Option<RoutingDecision> {
    let dispatcher = match open_dispatcher(settings) {
        Ok(dispatcher) => dispatcher,
        Err(e) if e.is_config_error() => {
            error!(error = %e, "Routing disabled: could not load routing rules");
            return None;
        }
        Err(e) => {
            warn!(error = %e, "Routing skipped");
            return None;
        }
    };

    match dispatcher.dispatch(trigger, parent) {
        Ok(decision) => Some(decision),
        Err(suppressed) if suppressed.is_guard_block() => {
            warn!(reason = %suppressed, "Loop prevention suppressed a dispatch");
            None
        }
        Err(suppressed) => {
            debug!(reason = %suppressed, "Host dispatch produced no decision");
            None
        }
    }
}
