//! Winner selection
//!
//! Applies the confidence floor, resolves ties through the declared
//! `conflictResolution` pairs and classifies the winner's confidence.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::rules::RuleSet;
use super::scorer::{Scores, SpecialistScore};

/// Scores at or above this are high confidence
pub const HIGH_CONFIDENCE_SCORE: i64 = 30;
/// Scores at or above this (and below high) are medium confidence
pub const MEDIUM_CONFIDENCE_SCORE: i64 = 20;

/// Coarse classification of how strongly a trigger matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn from_score(score: i64) -> Self {
        if score >= HIGH_CONFIDENCE_SCORE {
            Confidence::High
        } else if score >= MEDIUM_CONFIDENCE_SCORE {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The specialist chosen for a trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDecision {
    pub specialist: String,
    pub score: i64,
    pub confidence: Confidence,
    pub context_files: Vec<String>,
    /// Advisory explanation; not used by any further logic
    pub reason: String,
}

/// Pick the winning specialist, or `None` when nothing clears the floor
pub fn select(scores: &Scores, rules: &RuleSet) -> Option<RoutingDecision> {
    let config = rules.config();
    let min_score = config.confidence_threshold.min_score;

    let mut candidates: Vec<&SpecialistScore> =
        scores.iter().filter(|s| s.score >= min_score).collect();
    if candidates.is_empty() {
        return None;
    }
    // Stable: equal scores keep rule-document order
    candidates.sort_by(|a, b| b.score.cmp(&a.score));

    let top = candidates[0].score;
    let tied: Vec<&SpecialistScore> = candidates
        .iter()
        .copied()
        .take_while(|s| s.score == top)
        .collect();

    let is_tied = |name: &str| tied.iter().any(|s| s.specialist == name);
    let winner = if tied.len() == 1 {
        tied[0]
    } else {
        config
            .tie_breaking
            .conflict_resolution
            .iter()
            .find(|rule| is_tied(&rule.winner) && is_tied(&rule.loser))
            .and_then(|rule| tied.iter().copied().find(|s| s.specialist == rule.winner))
            .unwrap_or(tied[0])
    };

    let context_files = config
        .specialist(&winner.specialist)
        .map(|rule| rule.context_files.clone())
        .unwrap_or_default();

    Some(RoutingDecision {
        specialist: winner.specialist.clone(),
        score: winner.score,
        confidence: Confidence::from_score(winner.score),
        context_files,
        reason: describe(winner, tied.len()),
    })
}

fn describe(winner: &SpecialistScore, tied: usize) -> String {
    let b = &winner.breakdown;
    let mut parts = Vec::new();
    if b.file_matches > 0 {
        parts.push(format!("{} file path match(es)", b.file_matches));
    }
    if b.keyword_matches > 0 {
        parts.push(format!("{} keyword match(es)", b.keyword_matches));
    }
    if b.intent_matched {
        parts.push("intent pattern match".to_string());
    }
    if b.bonus != 0 {
        parts.push(format!("specificity bonus {:+}", b.bonus));
    }

    let mut reason = if parts.is_empty() {
        format!("score {} with no channel matches", winner.score)
    } else {
        format!("score {} from {}", winner.score, parts.join(", "))
    };
    if tied > 1 {
        reason.push_str(&format!(" (won tie among {})", tied));
    }
    reason
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::scorer::{score, ScoreBreakdown, Trigger};

    fn rules(json: &str) -> RuleSet {
        RuleSet::from_json_str(json).unwrap()
    }

    fn scores(entries: &[(&str, i64)]) -> Scores {
        entries
            .iter()
            .map(|(name, score)| SpecialistScore {
                specialist: name.to_string(),
                score: *score,
                breakdown: ScoreBreakdown::default(),
            })
            .collect()
    }

    const TWO: &str = r#"{
        "specialists": {
            "frontend-shipper": { "contextFiles": ["docs/ui.md"] },
            "backend-dev": { "contextFiles": ["docs/api.md", "docs/db.md"] }
        },
        "tieBreaking": {
            "conflictResolution": [["backend-dev", "frontend-shipper"]]
        },
        "confidenceThreshold": { "minScore": 10 }
    }"#;

    #[test]
    fn test_confidence_buckets() {
        assert_eq!(Confidence::from_score(30), Confidence::High);
        assert_eq!(Confidence::from_score(29), Confidence::Medium);
        assert_eq!(Confidence::from_score(20), Confidence::Medium);
        assert_eq!(Confidence::from_score(19), Confidence::Low);
    }

    #[test]
    fn test_nothing_above_floor() {
        let decision = select(&scores(&[("frontend-shipper", 9), ("backend-dev", 0)]), &rules(TWO));
        assert!(decision.is_none());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let decision = select(&scores(&[("frontend-shipper", 10), ("backend-dev", 9)]), &rules(TWO))
            .unwrap();
        assert_eq!(decision.specialist, "frontend-shipper");
        assert_eq!(decision.confidence, Confidence::Low);
    }

    #[test]
    fn test_highest_score_wins() {
        let decision = select(&scores(&[("frontend-shipper", 20), ("backend-dev", 35)]), &rules(TWO))
            .unwrap();
        assert_eq!(decision.specialist, "backend-dev");
        assert_eq!(decision.score, 35);
        assert_eq!(decision.confidence, Confidence::High);
        assert_eq!(decision.context_files, vec!["docs/api.md", "docs/db.md"]);
    }

    #[test]
    fn test_conflict_resolution_breaks_tie() {
        let decision = select(&scores(&[("frontend-shipper", 25), ("backend-dev", 25)]), &rules(TWO))
            .unwrap();
        assert_eq!(decision.specialist, "backend-dev");
        assert_eq!(decision.confidence, Confidence::Medium);
        assert!(decision.reason.contains("won tie among 2"));
    }

    #[test]
    fn test_first_applicable_pair_decides() {
        let rules = rules(
            r#"{
                "specialists": { "a": {}, "b": {}, "c": {} },
                "tieBreaking": { "conflictResolution": [["x", "a"], ["c", "b"], ["b", "c"]] }
            }"#,
        );
        let decision = select(&scores(&[("a", 20), ("b", 20), ("c", 20)]), &rules).unwrap();
        assert_eq!(decision.specialist, "c");
    }

    #[test]
    fn test_pair_ignored_when_loser_not_tied() {
        let rules = rules(
            r#"{
                "specialists": { "a": {}, "b": {}, "c": {} },
                "tieBreaking": { "conflictResolution": [["b", "c"]] }
            }"#,
        );
        let decision = select(&scores(&[("a", 20), ("b", 20), ("c", 15)]), &rules).unwrap();
        assert_eq!(decision.specialist, "a");
    }

    #[test]
    fn test_unresolved_tie_uses_document_order() {
        let rules = rules(r#"{"specialists": {"a": {}, "b": {}}}"#);
        let decision = select(&scores(&[("a", 12), ("b", 12)]), &rules).unwrap();
        assert_eq!(decision.specialist, "a");
    }

    #[test]
    fn test_reason_lists_channels() {
        let rules = rules(
            r#"{
                "specialists": {
                    "backend-dev": { "triggers": { "filePaths": ["api/**"], "keywords": ["sql"] } }
                },
                "tieBreaking": { "specificityBonus": { "backend-dev": 2 } }
            }"#,
        );
        let trigger = Trigger::new().with_file("api/a.py").with_keyword("postgresql");
        let decision = select(&score(&trigger, &rules), &rules).unwrap();
        assert_eq!(decision.score, 32);
        assert_eq!(
            decision.reason,
            "score 32 from 1 file path match(es), 1 keyword match(es), specificity bonus +2"
        );
    }

    #[test]
    fn test_decision_serializes_camel_case() {
        let decision = select(&scores(&[("backend-dev", 20)]), &rules(TWO)).unwrap();
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["confidence"], "medium");
        assert_eq!(json["contextFiles"][0], "docs/api.md");
    }
}
