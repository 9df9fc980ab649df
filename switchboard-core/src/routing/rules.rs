//! Routing rules: the declarative specialist configuration
//!
//! The rules file is a JSON document describing every specialist's trigger
//! patterns together with tie-breaking, anti-loop and confidence settings.
//! Loading compiles every glob and regex once and caches the result for the
//! lifetime of the process, keyed by path.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use globset::{GlobBuilder, GlobMatcher};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Default location of the rules file, relative to the project root
pub const DEFAULT_RULES_PATH: &str = ".claude/agents/agent-routing-rules.json";

/// Informational priority of a specialist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        write!(f, "{}", name)
    }
}

/// Trigger channels a specialist listens on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Triggers {
    /// Glob patterns matched against edited file paths
    pub file_paths: Vec<String>,
    /// Lowercase substrings matched against trigger keywords
    pub keywords: Vec<String>,
    /// Case-insensitive regular expressions matched against the intent text
    pub intent_patterns: Vec<String>,
}

/// Routing rule for one named specialist
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpecialistRule {
    pub triggers: Triggers,
    /// Files surfaced to the specialist when it is chosen
    pub context_files: Vec<String>,
    pub priority: Priority,
    /// Score bonus used when `tieBreaking.specificityBonus` has no entry
    pub specificity: i64,
}

/// A `(winner, loser)` precedence pair used to break ties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ConflictRuleRepr")]
pub struct ConflictRule {
    pub winner: String,
    pub loser: String,
}

impl ConflictRule {
    pub fn new(winner: impl Into<String>, loser: impl Into<String>) -> Self {
        Self {
            winner: winner.into(),
            loser: loser.into(),
        }
    }
}

/// Accepts both `{"winner": .., "loser": ..}` and `["winner", "loser"]`
#[derive(Deserialize)]
#[serde(untagged)]
enum ConflictRuleRepr {
    Named { winner: String, loser: String },
    Pair(String, String),
}

impl From<ConflictRuleRepr> for ConflictRule {
    fn from(repr: ConflictRuleRepr) -> Self {
        match repr {
            ConflictRuleRepr::Named { winner, loser } | ConflictRuleRepr::Pair(winner, loser) => {
                ConflictRule { winner, loser }
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TieBreaking {
    /// Per-specialist bonus merged into the score
    pub specificity_bonus: BTreeMap<String, i64>,
    /// Ordered precedence pairs; the first applicable pair decides a tie
    pub conflict_resolution: Vec<ConflictRule>,
}

/// Chain limits enforced by the chain ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AntiLoop {
    pub max_chain_depth: u32,
    pub cooldown_seconds: u64,
}

impl Default for AntiLoop {
    fn default() -> Self {
        Self {
            max_chain_depth: 3,
            cooldown_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfidenceThreshold {
    /// Candidates scoring strictly below this are excluded
    pub min_score: i64,
}

impl Default for ConfidenceThreshold {
    fn default() -> Self {
        Self { min_score: 10 }
    }
}

/// The routing configuration as written on disk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Specialists in document order; names are unique
    #[serde(with = "ordered_map")]
    pub specialists: Vec<(String, SpecialistRule)>,
    #[serde(default)]
    pub chain_rules: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub tie_breaking: TieBreaking,
    #[serde(default)]
    pub anti_loop: AntiLoop,
    #[serde(default)]
    pub confidence_threshold: ConfidenceThreshold,
}

impl RoutingConfig {
    /// Look up a specialist rule by name
    pub fn specialist(&self, name: &str) -> Option<&SpecialistRule> {
        self.specialists
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, rule)| rule)
    }

    /// Specialist names in document order
    pub fn specialist_names(&self) -> impl Iterator<Item = &str> {
        self.specialists.iter().map(|(name, _)| name.as_str())
    }

    /// Effective specificity bonus for a specialist
    ///
    /// `tieBreaking.specificityBonus` wins over the rule's own `specificity`.
    pub fn specificity_bonus(&self, name: &str) -> i64 {
        self.tie_breaking
            .specificity_bonus
            .get(name)
            .copied()
            .or_else(|| self.specialist(name).map(|rule| rule.specificity))
            .unwrap_or(0)
    }

    /// Structural checks that serde cannot express
    fn validate(&self, path: &Path) -> Result<()> {
        let parse_error = |message: String| Error::ConfigParse {
            path: path.to_path_buf(),
            message,
        };

        for (i, (name, _)) in self.specialists.iter().enumerate() {
            if self.specialists[..i].iter().any(|(other, _)| other == name) {
                return Err(parse_error(format!("duplicate specialist '{}'", name)));
            }
        }
        if self.anti_loop.max_chain_depth < 1 {
            return Err(parse_error("antiLoop.maxChainDepth must be at least 1".into()));
        }
        if self.anti_loop.cooldown_seconds < 1 {
            return Err(parse_error("antiLoop.cooldownSeconds must be at least 1".into()));
        }

        let known = |name: &str| self.specialist(name).is_some();
        for (from, next) in &self.chain_rules {
            for name in std::iter::once(from).chain(next) {
                if !known(name) {
                    warn!(specialist = %name, "chainRules references unknown specialist");
                }
            }
        }
        for name in self.tie_breaking.specificity_bonus.keys() {
            if !known(name) {
                warn!(specialist = %name, "specificityBonus references unknown specialist");
            }
        }
        for rule in &self.tie_breaking.conflict_resolution {
            for name in [&rule.winner, &rule.loser] {
                if !known(name) {
                    warn!(specialist = %name, "conflictResolution references unknown specialist");
                }
            }
        }
        Ok(())
    }
}

/// Compiled trigger patterns for one specialist
#[derive(Debug, Clone)]
pub(crate) struct SpecialistMatcher {
    pub(crate) name: String,
    pub(crate) globs: Vec<GlobMatcher>,
    pub(crate) keywords: Vec<String>,
    pub(crate) intents: Vec<Regex>,
}

impl SpecialistMatcher {
    fn compile(name: &str, rule: &SpecialistRule) -> Result<Self> {
        let invalid = |pattern: &str, message: String| Error::InvalidPattern {
            specialist: name.to_string(),
            pattern: pattern.to_string(),
            message,
        };

        let globs = rule
            .triggers
            .file_paths
            .iter()
            .map(|pattern| {
                GlobBuilder::new(pattern)
                    .literal_separator(true)
                    .build()
                    .map(|glob| glob.compile_matcher())
                    .map_err(|e| invalid(pattern, e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        let intents = rule
            .triggers
            .intent_patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| invalid(pattern, e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        let keywords = rule
            .triggers
            .keywords
            .iter()
            .map(|kw| kw.to_lowercase())
            .filter(|kw| !kw.is_empty())
            .collect();

        Ok(Self {
            name: name.to_string(),
            globs,
            keywords,
            intents,
        })
    }
}

/// A validated routing configuration with its patterns compiled
///
/// Immutable once built; a reload produces a new `RuleSet`.
#[derive(Debug, Clone)]
pub struct RuleSet {
    config: RoutingConfig,
    matchers: Vec<SpecialistMatcher>,
}

impl RuleSet {
    /// Validate and compile a configuration
    pub fn from_config(config: RoutingConfig) -> Result<Self> {
        Self::build(config, Path::new("<memory>"))
    }

    /// Parse, validate and compile a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::parse(json, Path::new("<memory>"))
    }

    /// Read a rules file from disk, bypassing the process cache
    pub fn read(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ConfigNotFound(path.to_path_buf()))
            }
            Err(e) => {
                return Err(Error::ConfigParse {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }
        };
        Self::parse(&contents, path)
    }

    fn parse(json: &str, path: &Path) -> Result<Self> {
        let config: RoutingConfig = serde_json::from_str(json).map_err(|e| Error::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::build(config, path)
    }

    fn build(config: RoutingConfig, path: &Path) -> Result<Self> {
        config.validate(path)?;
        let matchers = config
            .specialists
            .iter()
            .map(|(name, rule)| SpecialistMatcher::compile(name, rule))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { config, matchers })
    }

    /// The underlying configuration
    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    pub(crate) fn matchers(&self) -> &[SpecialistMatcher] {
        &self.matchers
    }
}

static RULE_CACHE: Lazy<Mutex<HashMap<PathBuf, Arc<RuleSet>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Process-wide cache of loaded rule sets
pub struct RuleStore;

impl RuleStore {
    /// Load the rules at `path`, or at [`DEFAULT_RULES_PATH`] when `None`
    ///
    /// Repeated loads of the same path return the same shared `RuleSet`
    /// without touching the disk again.
    pub fn load(path: Option<&Path>) -> Result<Arc<RuleSet>> {
        let key = resolve(path);
        if let Some(rules) = cache().get(&key) {
            debug!(path = %key.display(), "Routing rules served from cache");
            return Ok(Arc::clone(rules));
        }
        Self::reload(Some(&key))
    }

    /// Re-read the rules at `path` and replace the cached snapshot
    pub fn reload(path: Option<&Path>) -> Result<Arc<RuleSet>> {
        let key = resolve(path);
        let rules = Arc::new(RuleSet::read(&key)?);
        debug!(
            path = %key.display(),
            specialists = rules.config().specialists.len(),
            "Routing rules loaded"
        );
        cache().insert(key, Arc::clone(&rules));
        Ok(rules)
    }
}

fn cache() -> std::sync::MutexGuard<'static, HashMap<PathBuf, Arc<RuleSet>>> {
    // A panic while holding the lock leaves the map itself intact
    RULE_CACHE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn resolve(path: Option<&Path>) -> PathBuf {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_RULES_PATH));
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Serde adapter keeping a JSON object's key order as a `Vec` of pairs
mod ordered_map {
    use std::fmt;
    use std::marker::PhantomData;

    use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
    use serde::ser::{Serialize, SerializeMap, Serializer};

    pub fn serialize<S, V>(entries: &[(String, V)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Serialize,
    {
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
            type Value = Vec<(String, V)>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of specialist names to rules")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry()? {
                    entries.push((key, value));
                }
                Ok(entries)
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}
