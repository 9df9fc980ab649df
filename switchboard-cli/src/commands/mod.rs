//! CLI command implementations

pub mod breaker;
pub mod chain;
pub mod hook;
pub mod route;
pub mod score;

pub use breaker::BreakerArgs;
pub use chain::ChainArgs;
pub use hook::HookArgs;
pub use route::RouteArgs;
pub use score::ScoreArgs;

use clap::Args;
use serde::Serialize;
use switchboard_core::Trigger;

/// Trigger event given on the command line
#[derive(Args, Debug, Clone, Default)]
pub struct TriggerArgs {
    /// Edited file path (repeatable)
    #[arg(short, long = "file")]
    pub files: Vec<String>,

    /// Keyword from the event (repeatable)
    #[arg(short, long = "keyword")]
    pub keywords: Vec<String>,

    /// Free-text intent
    #[arg(short, long)]
    pub intent: Option<String>,
}

impl TriggerArgs {
    pub fn to_trigger(&self) -> Trigger {
        Trigger {
            file_paths: self.files.clone(),
            keywords: self.keywords.clone(),
            intent: self.intent.clone(),
        }
    }
}

/// Print a value as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
