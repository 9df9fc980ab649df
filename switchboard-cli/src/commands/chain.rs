//! Chain ledger commands

use clap::{Args, Subcommand};
use switchboard_core::guard::ChainHistory;
use switchboard_core::routing::AntiLoop;
use switchboard_core::{open_dispatcher, ChainLedger, JsonFileStore, Settings};

use super::print_json;

/// Chain ledger commands
#[derive(Args, Debug)]
pub struct ChainArgs {
    #[command(subcommand)]
    pub command: ChainCommand,
}

#[derive(Subcommand, Debug)]
pub enum ChainCommand {
    /// Suggest follow-up specialists after one completes
    Next {
        /// Specialist that just completed
        specialist: String,
    },

    /// Show the current session's chain
    Status,

    /// Clear the chain
    Reset {
        /// Only clear when the stored chain belongs to this session
        session: Option<String>,
    },
}

impl ChainArgs {
    pub fn execute(&self, settings: &Settings) -> anyhow::Result<()> {
        match &self.command {
            ChainCommand::Next { specialist } => {
                let dispatcher = open_dispatcher(settings)?;
                print_json(&dispatcher.next_in_chain(specialist))
            }
            ChainCommand::Status => {
                let dispatcher = open_dispatcher(settings)?;
                print_json(&dispatcher.ledger().status())
            }
            ChainCommand::Reset { session } => {
                // Limits play no part in a reset, so the rules file is not needed
                let ledger = ChainLedger::new(
                    JsonFileStore::<ChainHistory>::new(settings.chain_history_path()),
                    settings.state.session_id.clone(),
                    AntiLoop::default(),
                );
                ledger.reset(session.as_deref())?;
                match session {
                    Some(session) => println!("Chain reset for session {}", session),
                    None => println!("Chain reset"),
                }
                Ok(())
            }
        }
    }
}
