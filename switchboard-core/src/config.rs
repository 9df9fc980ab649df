//! Configuration management for Switchboard
//!
//! These are the tool's own settings (where the routing rules and state files
//! live, breaker limits), not the routing rules themselves.
//!
//! Settings are loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (SWITCHBOARD_*)
//! 3. Config file (~/.config/switchboard/config.toml)
//! 4. Default values

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::guard::BreakerLimits;
use crate::routing::DEFAULT_RULES_PATH;
use crate::{Error, Result};

/// File name of the chain ledger inside the state directory
pub const CHAIN_HISTORY_FILE: &str = "chain-history.json";
/// File name of the circuit breaker state inside the state directory
pub const CIRCUIT_BREAKER_FILE: &str = "circuit-breaker.json";

/// Routing rules location
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingSettings {
    /// Path to the routing rules JSON
    pub rules_path: PathBuf,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            rules_path: PathBuf::from(DEFAULT_RULES_PATH),
        }
    }
}

/// Persisted guard state location
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StateSettings {
    /// Directory holding the chain ledger and circuit breaker files
    pub dir: PathBuf,

    /// Session the chain ledger belongs to
    pub session_id: String,
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".claude/state"),
            session_id: "default".to_string(),
        }
    }
}

/// Root settings structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub routing: RoutingSettings,
    pub state: StateSettings,
    pub breaker: BreakerLimits,
}

/// Overrides taken from command line flags
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub rules_path: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
    pub session_id: Option<String>,
}

impl Settings {
    /// Load settings from the default config file location
    ///
    /// Returns default settings if the file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load settings from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Settings(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/switchboard/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("switchboard").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - SWITCHBOARD_RULES: Path to the routing rules
    /// - SWITCHBOARD_STATE_DIR: Directory for guard state files
    /// - SWITCHBOARD_SESSION_ID: Chain ledger session
    /// - SWITCHBOARD_MAX_DEPTH: Circuit breaker depth limit
    /// - SWITCHBOARD_MAX_CALLS: Circuit breaker frequency limit
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(path) = var("SWITCHBOARD_RULES") {
            self.routing.rules_path = PathBuf::from(path);
        }

        if let Some(dir) = var("SWITCHBOARD_STATE_DIR") {
            self.state.dir = PathBuf::from(dir);
        }

        if let Some(session) = var("SWITCHBOARD_SESSION_ID").filter(|s| !s.trim().is_empty()) {
            self.state.session_id = session;
        }

        if let Some(depth) = var("SWITCHBOARD_MAX_DEPTH") {
            self.breaker.max_depth = parse_limit("SWITCHBOARD_MAX_DEPTH", &depth)?;
        }

        if let Some(calls) = var("SWITCHBOARD_MAX_CALLS") {
            self.breaker.max_calls_per_window = parse_limit("SWITCHBOARD_MAX_CALLS", &calls)?;
        }

        Ok(self)
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, overrides: CliOverrides) -> Self {
        if let Some(path) = overrides.rules_path {
            self.routing.rules_path = path;
        }

        if let Some(dir) = overrides.state_dir {
            self.state.dir = dir;
        }

        if let Some(session) = overrides.session_id {
            self.state.session_id = session;
        }

        self
    }

    /// Load settings with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults. An explicit `config_path`
    /// replaces the default config file location. Breaker limits are
    /// validated once every layer is applied.
    pub fn load_with_overrides(config_path: Option<&Path>, overrides: CliOverrides) -> Result<Self> {
        let base = match config_path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load()?,
        };
        let settings = base.with_env_overrides()?.with_cli_overrides(overrides);
        settings.breaker.validate()?;
        Ok(settings)
    }

    /// Path of the chain ledger file
    pub fn chain_history_path(&self) -> PathBuf {
        self.state.dir.join(CHAIN_HISTORY_FILE)
    }

    /// Path of the circuit breaker file
    pub fn circuit_breaker_path(&self) -> PathBuf {
        self.state.dir.join(CIRCUIT_BREAKER_FILE)
    }
}

fn parse_limit(name: &str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Settings(format!("{} must be an unsigned integer, got {:?}", name, value)))
}
