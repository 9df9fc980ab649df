//! Specialist routing: rules, scoring and winner selection

mod rules;
mod scorer;
mod selector;

pub use rules::{
    AntiLoop, ConfidenceThreshold, ConflictRule, Priority, RoutingConfig, RuleSet, RuleStore,
    SpecialistRule, TieBreaking, Triggers, DEFAULT_RULES_PATH,
};
pub use scorer::{
    score, ScoreBreakdown, Scores, SpecialistScore, Trigger, FILE_MATCH_POINTS,
    INTENT_MATCH_POINTS, KEYWORD_MATCH_POINTS,
};
pub use selector::{
    select, Confidence, RoutingDecision, HIGH_CONFIDENCE_SCORE, MEDIUM_CONFIDENCE_SCORE,
};
