//! Switchboard CLI - route trigger events to specialist handlers
//!
//! Every invocation is a separate process; the chain ledger and circuit
//! breaker persist their state in files under the state directory.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use switchboard_core::{CliOverrides, Settings};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{BreakerArgs, ChainArgs, HookArgs, RouteArgs, ScoreArgs};

/// Switchboard: specialist dispatch with loop prevention
#[derive(Parser, Debug)]
#[command(name = "switchboard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (replaces ~/.config/switchboard/config.toml)
    #[arg(long, global = true, env = "SWITCHBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Routing rules JSON (overrides settings and env)
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    /// Directory for the chain ledger and circuit breaker files
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Chain ledger session
    #[arg(long, global = true)]
    session: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Route a trigger and record the dispatch
    #[command(visible_alias = "r")]
    Route(RouteArgs),

    /// Score a trigger without touching either guard
    Score(ScoreArgs),

    /// Host hook: read a trigger from stdin, print the decision if any
    Hook(HookArgs),

    /// Inspect or reset the chain ledger
    Chain(ChainArgs),

    /// Inspect, update or reset the circuit breaker
    Breaker(BreakerArgs),

    /// Show current configuration
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries JSON for the host
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let overrides = CliOverrides {
        rules_path: cli.rules.clone(),
        state_dir: cli.state_dir.clone(),
        session_id: cli.session.clone(),
    };
    let settings = Settings::load_with_overrides(cli.config.as_deref(), overrides);

    // The hook must exit 0 even when the settings are broken
    if let Some(Commands::Hook(args)) = &cli.command {
        args.execute(settings);
        return Ok(());
    }

    let settings = settings?;
    if cli.verbose {
        tracing::info!(
            rules = %settings.routing.rules_path.display(),
            state_dir = %settings.state.dir.display(),
            session = %settings.state.session_id,
            "Configuration loaded"
        );
    }

    match cli.command {
        Some(Commands::Version) => {
            println!("switchboard {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Route(args)) => {
            args.execute(&settings)?;
        }
        Some(Commands::Score(args)) => {
            args.execute(&settings)?;
        }
        Some(Commands::Hook(_)) => {}
        Some(Commands::Chain(args)) => {
            args.execute(&settings)?;
        }
        Some(Commands::Breaker(args)) => {
            args.execute(&settings)?;
        }
        Some(Commands::Config) => show_config(&settings),
        None => {
            println!("Switchboard - specialist dispatch with loop prevention");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

fn show_config(settings: &Settings) {
    println!("Switchboard Configuration");
    println!("=========================");
    println!();
    println!("Routing:");
    println!("  rules_path: {}", settings.routing.rules_path.display());
    println!();
    println!("State:");
    println!("  dir: {}", settings.state.dir.display());
    println!("  session_id: {}", settings.state.session_id);
    println!("  chain history: {}", settings.chain_history_path().display());
    println!("  circuit breaker: {}", settings.circuit_breaker_path().display());
    println!();
    println!("Circuit Breaker:");
    println!("  max_depth: {}", settings.breaker.max_depth);
    println!("  depth_window: {}s", settings.breaker.depth_window.as_secs());
    println!("  max_calls_per_window: {}", settings.breaker.max_calls_per_window);
    println!("  frequency_window: {}s", settings.breaker.frequency_window.as_secs());
    println!();
    if let Some(path) = Settings::default_config_path() {
        println!("Config file: {}", path.display());
        if path.exists() {
            println!("  (exists)");
        } else {
            println!("  (not found - using defaults)");
        }
    }
}
