//! Route command - dispatch a trigger through both guards

use chrono::Utc;
use clap::Args;
use serde_json::json;
use switchboard_core::{open_dispatcher, Settings};

use super::{print_json, TriggerArgs};

/// Route a trigger to a specialist and record the dispatch
#[derive(Args, Debug)]
pub struct RouteArgs {
    #[command(flatten)]
    pub trigger: TriggerArgs,

    /// Agent identity invoking the specialist
    #[arg(short, long)]
    pub parent: Option<String>,

    /// Also print the phases the attempt went through
    #[arg(long)]
    pub trace: bool,
}

impl RouteArgs {
    /// Execute the route command
    ///
    /// A suppressed attempt is a normal outcome and still exits 0.
    pub fn execute(&self, settings: &Settings) -> anyhow::Result<()> {
        let dispatcher = open_dispatcher(settings)?;
        let trigger = self.trigger.to_trigger();

        let (outcome, trace) =
            dispatcher.dispatch_traced(&trigger, self.parent.as_deref(), Utc::now());
        let result = match &outcome {
            Ok(decision) => serde_json::to_value(decision)?,
            Err(suppressed) => json!({ "suppressed": suppressed }),
        };

        if self.trace {
            print_json(&json!({ "result": result, "phases": trace.phases() }))
        } else {
            print_json(&result)
        }
    }
}
