//! Hook command - the host's entry point
//!
//! Reads one trigger as JSON from stdin and prints the routing decision as
//! JSON, or nothing. Never fails: the host must not be blocked by routing.

use std::io::Read;

use clap::Args;
use switchboard_core::{dispatch_for_host, RoutingDecision, Settings, Trigger};
use tracing::{error, warn};

/// Route a trigger read from stdin on behalf of the host
#[derive(Args, Debug)]
pub struct HookArgs {
    /// Agent identity invoking the specialist
    #[arg(short, long)]
    pub parent: Option<String>,
}

impl HookArgs {
    pub fn execute(&self, settings: switchboard_core::Result<Settings>) {
        let settings = match settings {
            Ok(settings) => settings,
            Err(e) => {
                error!(error = %e, "Routing disabled: could not load settings");
                return;
            }
        };

        let mut input = String::new();
        if let Err(e) = std::io::stdin().read_to_string(&mut input) {
            warn!(error = %e, "Could not read trigger from stdin");
            return;
        }

        if let Some(decision) = self.route(&settings, &input) {
            match serde_json::to_string(&decision) {
                Ok(json) => println!("{}", json),
                Err(e) => warn!(error = %e, "Could not serialize routing decision"),
            }
        }
    }

    fn route(&self, settings: &Settings, input: &str) -> Option<RoutingDecision> {
        let trigger = parse_trigger(input)?;
        dispatch_for_host(settings, &trigger, self.parent.as_deref())
    }
}

/// Parse the stdin payload; blank input or a non-trigger payload yields `None`
fn parse_trigger(input: &str) -> Option<Trigger> {
    if input.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<Trigger>(input) {
        Ok(trigger) if !trigger.is_empty() => Some(trigger),
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "Ignoring malformed trigger payload");
            None
        }
    }
}
