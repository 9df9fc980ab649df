//! Trigger scoring
//!
//! Every specialist gets an integer score for a trigger:
//! - 20 per edited file matched by any of its globs
//! - 10 per trigger keyword containing any of its keywords
//! - 15 once if any of its intent patterns matches
//! - its specificity bonus
//!
//! The scorer never filters or ranks; that is the selector's job.

use serde::{Deserialize, Serialize};

use super::rules::{RuleSet, SpecialistMatcher};

/// Points for each matching file path
pub const FILE_MATCH_POINTS: i64 = 20;
/// Points for each matching keyword
pub const KEYWORD_MATCH_POINTS: i64 = 10;
/// Points for a matching intent (awarded at most once)
pub const INTENT_MATCH_POINTS: i64 = 15;

/// An event describing what changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Trigger {
    pub file_paths: Vec<String>,
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
}

impl Trigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.file_paths.push(path.into());
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.push(keyword.into());
        self
    }

    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = Some(intent.into());
        self
    }

    /// Whether the trigger carries nothing to match on
    pub fn is_empty(&self) -> bool {
        self.file_paths.is_empty()
            && self.keywords.is_empty()
            && self.intent.as_deref().map_or(true, |i| i.trim().is_empty())
    }
}

/// Per-channel hits behind a specialist's score
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub file_matches: usize,
    pub keyword_matches: usize,
    pub intent_matched: bool,
    pub bonus: i64,
}

impl ScoreBreakdown {
    /// Total score for these hits
    pub fn total(&self) -> i64 {
        self.file_matches as i64 * FILE_MATCH_POINTS
            + self.keyword_matches as i64 * KEYWORD_MATCH_POINTS
            + if self.intent_matched { INTENT_MATCH_POINTS } else { 0 }
            + self.bonus
    }
}

/// Score for one specialist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialistScore {
    pub specialist: String,
    pub score: i64,
    pub breakdown: ScoreBreakdown,
}

/// Scores for every specialist, in rule-document order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores(Vec<SpecialistScore>);

impl Scores {
    pub fn get(&self, specialist: &str) -> Option<i64> {
        self.entry(specialist).map(|s| s.score)
    }

    pub fn entry(&self, specialist: &str) -> Option<&SpecialistScore> {
        self.0.iter().find(|s| s.specialist == specialist)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpecialistScore> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<SpecialistScore> for Scores {
    fn from_iter<I: IntoIterator<Item = SpecialistScore>>(iter: I) -> Self {
        Scores(iter.into_iter().collect())
    }
}

/// Score a trigger against every specialist in the rule set
pub fn score(trigger: &Trigger, rules: &RuleSet) -> Scores {
    let paths: Vec<String> = trigger.file_paths.iter().map(|p| normalize_path(p)).collect();
    let keywords: Vec<String> = trigger.keywords.iter().map(|k| k.to_lowercase()).collect();
    let intent = trigger.intent.as_deref().filter(|i| !i.trim().is_empty());

    rules
        .matchers()
        .iter()
        .map(|matcher| {
            let breakdown = ScoreBreakdown {
                file_matches: paths.iter().filter(|p| matches_path(matcher, p)).count(),
                keyword_matches: keywords
                    .iter()
                    .filter(|k| matches_keyword(matcher, k))
                    .count(),
                intent_matched: intent.is_some_and(|i| matcher.intents.iter().any(|re| re.is_match(i))),
                bonus: rules.config().specificity_bonus(&matcher.name),
            };
            SpecialistScore {
                specialist: matcher.name.clone(),
                score: breakdown.total(),
                breakdown,
            }
        })
        .collect()
}

fn matches_path(matcher: &SpecialistMatcher, path: &str) -> bool {
    matcher.globs.iter().any(|glob| glob.is_match(path))
}

fn matches_keyword(matcher: &SpecialistMatcher, keyword: &str) -> bool {
    matcher.keywords.iter().any(|kw| keyword.contains(kw.as_str()))
}

/// Forward slashes, no leading `./`
fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut trimmed = path.as_str();
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> RuleSet {
        RuleSet::from_json_str(
            r#"{
                "specialists": {
                    "backend-dev": {
                        "triggers": {
                            "filePaths": ["api/**", "**/*.py"],
                            "keywords": ["endpoint", "database"],
                            "intentPatterns": ["\\bapi\\b", "migrat(e|ion)"]
                        }
                    },
                    "frontend-shipper": {
                        "triggers": {
                            "filePaths": ["apps/web/**", "*.tsx"],
                            "keywords": ["ui", "component"]
                        }
                    },
                    "docs-writer": {
                        "triggers": { "filePaths": [".github/**", "**/*.md"] }
                    },
                    "idle": {}
                },
                "tieBreaking": { "specificityBonus": { "docs-writer": 3 } }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_single_file_match() {
        let scores = score(&Trigger::new().with_file("api/app/main.py"), &rules());
        // Two backend globs match the same file, but a file counts once
        assert_eq!(scores.get("backend-dev"), Some(20));
        assert_eq!(scores.get("frontend-shipper"), Some(0));
    }

    #[test]
    fn test_every_specialist_is_scored() {
        let scores = score(&Trigger::new(), &rules());
        assert_eq!(scores.len(), 4);
        assert_eq!(scores.get("idle"), Some(0));
        assert_eq!(scores.get("docs-writer"), Some(3));
    }

    #[test]
    fn test_each_file_counts() {
        let trigger = Trigger::new()
            .with_file("api/routes.py")
            .with_file("api/models.py")
            .with_file("README")
            .with_file("apps/web/App.tsx");
        let scores = score(&trigger, &rules());
        assert_eq!(scores.get("backend-dev"), Some(40));
        assert_eq!(scores.get("frontend-shipper"), Some(20));
    }

    #[test]
    fn test_star_does_not_cross_directories() {
        let scores = score(&Trigger::new().with_file("src/App.tsx"), &rules());
        assert_eq!(scores.get("frontend-shipper"), Some(0));
        let scores = score(&Trigger::new().with_file("App.tsx"), &rules());
        assert_eq!(scores.get("frontend-shipper"), Some(20));
    }

    #[test]
    fn test_dot_files_match() {
        let scores = score(&Trigger::new().with_file(".github/workflows/ci.yml"), &rules());
        assert_eq!(scores.get("docs-writer"), Some(23));
    }

    #[test]
    fn test_path_normalization() {
        let scores = score(&Trigger::new().with_file(".\\api\\main.rs"), &rules());
        assert_eq!(scores.get("backend-dev"), Some(20));
    }

    #[test]
    fn test_keyword_substring_case_insensitive() {
        let trigger = Trigger::new()
            .with_keyword("Database-Migration")
            .with_keyword("NewEndpoint")
            .with_keyword("styling");
        let scores = score(&trigger, &rules());
        assert_eq!(scores.get("backend-dev"), Some(20));
        assert_eq!(scores.get("frontend-shipper"), Some(0));
    }

    #[test]
    fn test_keyword_counts_once() {
        // "endpoint database" contains both backend keywords
        let scores = score(&Trigger::new().with_keyword("endpoint database"), &rules());
        assert_eq!(scores.get("backend-dev"), Some(10));
    }

    #[test]
    fn test_intent_awarded_once() {
        let trigger = Trigger::new().with_intent("Run the API MIGRATION");
        let entry = score(&trigger, &rules()).entry("backend-dev").cloned().unwrap();
        assert!(entry.breakdown.intent_matched);
        assert_eq!(entry.score, 15);
    }

    #[test]
    fn test_blank_intent_ignored() {
        let rules = RuleSet::from_json_str(
            r#"{"specialists": {"any": {"triggers": {"intentPatterns": [".*"]}}}}"#,
        )
        .unwrap();
        assert_eq!(score(&Trigger::new().with_intent("   "), &rules).get("any"), Some(0));
        assert_eq!(score(&Trigger::new().with_intent("x"), &rules).get("any"), Some(15));
    }

    #[test]
    fn test_breakdown_totals() {
        let trigger = Trigger::new()
            .with_file("api/main.py")
            .with_keyword("endpoint")
            .with_intent("api work");
        let entry = score(&trigger, &rules()).entry("backend-dev").cloned().unwrap();
        assert_eq!(
            entry.breakdown,
            ScoreBreakdown {
                file_matches: 1,
                keyword_matches: 1,
                intent_matched: true,
                bonus: 0,
            }
        );
        assert_eq!(entry.score, 45);
    }

    #[test]
    fn test_trigger_deserializes_camel_case() {
        let trigger: Trigger =
            serde_json::from_str(r#"{"filePaths": ["a.rs"], "intent": "fix"}"#).unwrap();
        assert_eq!(trigger.file_paths, vec!["a.rs"]);
        assert!(trigger.keywords.is_empty());
        assert!(!trigger.is_empty());
        assert!(Trigger::new().is_empty());
    }
}
