//! Circuit breaker commands
//!
//! These work on agent identities directly and do not need the routing rules.

use clap::{Args, Subcommand};
use switchboard_core::guard::BreakerState;
use switchboard_core::{CircuitBreaker, JsonFileStore, Settings};

use super::print_json;

/// Circuit breaker commands
#[derive(Args, Debug)]
pub struct BreakerArgs {
    #[command(subcommand)]
    pub command: BreakerCommand,
}

#[derive(Subcommand, Debug)]
pub enum BreakerCommand {
    /// Ask whether an identity may be invoked now
    Check {
        /// Agent identity
        identity: String,

        /// Invoking identity
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// Record an invocation
    Record {
        /// Agent identity
        identity: String,

        /// Invoking identity
        parent: Option<String>,
    },

    /// Forget one identity, or all of them
    Reset {
        /// Agent identity; every identity when omitted
        identity: Option<String>,
    },

    /// Show limits and per-identity statistics
    Status,
}

impl BreakerArgs {
    pub fn execute(&self, settings: &Settings) -> anyhow::Result<()> {
        let breaker = CircuitBreaker::new(
            JsonFileStore::<BreakerState>::new(settings.circuit_breaker_path()),
            settings.breaker,
        );

        match &self.command {
            BreakerCommand::Check { identity, parent } => {
                print_json(&breaker.check(identity, parent.as_deref()))
            }
            BreakerCommand::Record { identity, parent } => {
                breaker.record(identity, parent.as_deref())?;
                println!("Recorded call for {}", identity);
                Ok(())
            }
            BreakerCommand::Reset { identity } => {
                breaker.reset(identity.as_deref())?;
                match identity {
                    Some(identity) => println!("Circuit breaker reset for {}", identity),
                    None => println!("Circuit breaker reset"),
                }
                Ok(())
            }
            BreakerCommand::Status => print_json(&breaker.status()),
        }
    }
}
