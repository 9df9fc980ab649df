//! End-to-end routing and loop-prevention scenarios through the public API

use std::sync::Arc;

use chrono::{Duration, Utc};
use proptest::prelude::*;
use switchboard_core::guard::{BreakerState, ChainHistory};
use switchboard_core::routing::{score, select};
use switchboard_core::{
    BreakerLimits, ChainLedger, CircuitBreaker, Confidence, Dispatcher, JsonFileStore,
    MemoryStore, RuleSet, RuleStore, Suppressed, Trigger,
};
use tempfile::TempDir;

const RULES: &str = r#"{
    "version": "2.0.0",
    "description": "scenario rules",
    "specialists": {
        "frontend-shipper": {
            "triggers": {
                "filePaths": ["apps/web/**"],
                "keywords": ["button", "layout"]
            }
        },
        "backend-dev": {
            "triggers": {
                "filePaths": ["api/**"],
                "keywords": ["button", "layout"],
                "intentPatterns": ["\\bendpoint\\b"]
            },
            "contextFiles": ["api/README.md"]
        },
        "qa-tester": {
            "triggers": { "filePaths": ["tests/**"] }
        }
    },
    "chainRules": { "backend-dev": ["qa-tester"] },
    "tieBreaking": {
        "specificityBonus": { "frontend-shipper": 5, "backend-dev": 5 },
        "conflictResolution": [{ "winner": "backend-dev", "loser": "frontend-shipper" }]
    },
    "antiLoop": { "maxChainDepth": 3, "cooldownSeconds": 300 },
    "confidenceThreshold": { "minScore": 10 }
}"#;

fn rules() -> Arc<RuleSet> {
    Arc::new(RuleSet::from_json_str(RULES).unwrap())
}

#[test]
fn api_edit_routes_with_medium_confidence() {
    let rules = RuleSet::from_json_str(
        r#"{"specialists": {"backend-dev": {"triggers": {"filePaths": ["api/**"]}}}}"#,
    )
    .unwrap();
    let trigger = Trigger::new().with_file("api/app/main.py");

    let scores = score(&trigger, &rules);
    assert_eq!(scores.get("backend-dev"), Some(20));

    let decision = select(&scores, &rules).unwrap();
    assert_eq!(decision.specialist, "backend-dev");
    assert_eq!(decision.confidence, Confidence::Medium);
}

#[test]
fn keyword_tie_goes_to_declared_winner() {
    let rules = rules();
    let trigger = Trigger::new().with_keyword("button");

    let scores = score(&trigger, &rules);
    assert_eq!(scores.get("frontend-shipper"), Some(15));
    assert_eq!(scores.get("backend-dev"), Some(15));

    let with_layout = trigger.with_keyword("layout");
    let scores = score(&with_layout, &rules);
    assert_eq!(scores.get("frontend-shipper"), Some(25));
    assert_eq!(scores.get("backend-dev"), Some(25));
    assert_eq!(select(&scores, &rules).unwrap().specialist, "backend-dev");
}

#[test]
fn chain_depth_blocks_fourth_dispatch() {
    let ledger = ChainLedger::new(
        MemoryStore::<ChainHistory>::default(),
        "session",
        rules().config().anti_loop,
    );
    let t0 = Utc::now();
    for (i, specialist) in ["backend-dev", "qa-tester", "backend-dev"].iter().enumerate() {
        let at = t0 + Duration::seconds(60 * i as i64);
        assert!(ledger.check_depth_at(specialist, at).is_allowed());
        ledger.record_at(specialist, at).unwrap();
    }

    for specialist in ["backend-dev", "qa-tester", "frontend-shipper"] {
        let verdict = ledger.check_depth_at(specialist, t0 + Duration::seconds(240));
        assert!(!verdict.is_allowed());
        assert!(verdict.reason().unwrap().contains("max chain depth exceeded"));
    }
}

#[test]
fn six_plan_calls_open_the_circuit() {
    let breaker = CircuitBreaker::new(MemoryStore::<BreakerState>::default(), BreakerLimits::default());
    for _ in 0..6 {
        breaker.record("Plan", None).unwrap();
    }
    let verdict = breaker.check("Plan", None);
    assert!(!verdict.is_allowed());

    breaker.reset(Some("Plan")).unwrap();
    assert!(breaker.check("Plan", None).is_allowed());
}

#[test]
fn corrupt_chain_history_reads_as_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("chain-history.json");
    std::fs::write(&path, b"\x00\x01 not json").unwrap();

    let ledger = ChainLedger::new(JsonFileStore::new(&path), "session", rules().config().anti_loop);
    assert!(ledger.check_depth("backend-dev").is_allowed());
}

#[test]
fn file_backed_dispatch_survives_process_boundaries() {
    let dir = TempDir::new().unwrap();
    let chain_path = dir.path().join("chain-history.json");
    let breaker_path = dir.path().join("circuit-breaker.json");
    let open = || {
        Dispatcher::new(
            rules(),
            JsonFileStore::new(&chain_path),
            JsonFileStore::new(&breaker_path),
            "session",
            BreakerLimits::default(),
        )
    };

    let t0 = Utc::now();
    let api = Trigger::new().with_file("api/users.py");
    let tests = Trigger::new().with_file("tests/test_users.py");

    // Each "invocation" gets a fresh dispatcher over the same files
    assert_eq!(open().dispatch_at(&api, None, t0).unwrap().specialist, "backend-dev");
    let repeat = open().dispatch_at(&api, None, t0 + Duration::seconds(1));
    assert!(matches!(repeat, Err(Suppressed::ChainBlocked { .. })));

    assert_eq!(
        open().dispatch_at(&tests, None, t0 + Duration::seconds(2)).unwrap().specialist,
        "qa-tester"
    );
    assert_eq!(
        open().dispatch_at(&api, None, t0 + Duration::seconds(3)).unwrap().specialist,
        "backend-dev"
    );

    let full = open().dispatch_at(&tests, None, t0 + Duration::seconds(4));
    assert!(full.unwrap_err().reason().contains("max chain depth exceeded"));

    open().ledger().reset(Some("session")).unwrap();
    assert!(open().dispatch_at(&tests, None, t0 + Duration::seconds(5)).is_ok());
}

#[test]
fn repeated_config_load_is_identical() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rules.json");
    std::fs::write(&path, RULES).unwrap();

    let first = RuleStore::load(Some(&path)).unwrap();
    let second = RuleStore::load(Some(&path)).unwrap();
    assert_eq!(first.config(), second.config());
    assert!(Arc::ptr_eq(&first, &second));
}

/// Rules with `order` specialists in the given document order, all keyed on "x"
fn tied_rules(order: &[&str], winner: &str, loser: &str) -> RuleSet {
    let specialists = order
        .iter()
        .map(|name| format!(r#""{}": {{"triggers": {{"keywords": ["x"]}}}}"#, name))
        .collect::<Vec<_>>()
        .join(",");
    RuleSet::from_json_str(&format!(
        r#"{{
            "specialists": {{ {} }},
            "tieBreaking": {{ "conflictResolution": [["{}", "{}"]] }}
        }}"#,
        specialists, winner, loser
    ))
    .unwrap()
}

proptest! {
    #[test]
    fn prop_conflict_pair_wins_regardless_of_order(
        order in Just(vec!["alpha", "beta", "gamma", "delta"]).prop_shuffle(),
        pick in (0usize..4, 0usize..4).prop_filter("distinct", |(a, b)| a != b),
    ) {
        let names = ["alpha", "beta", "gamma", "delta"];
        let (winner, loser) = (names[pick.0], names[pick.1]);
        let rules = tied_rules(&order, winner, loser);

        let decision = select(&score(&Trigger::new().with_keyword("x"), &rules), &rules).unwrap();
        prop_assert_eq!(decision.specialist, winner);
    }

    #[test]
    fn prop_score_and_select_are_deterministic(
        files in prop::collection::vec("(api|apps/web|tests|docs)/[a-z]{1,8}\\.(py|ts|md)", 0..5),
        keywords in prop::collection::vec("[a-z]{0,10}", 0..4),
    ) {
        let rules = rules();
        let trigger = Trigger {
            file_paths: files,
            keywords,
            intent: None,
        };
        let first = score(&trigger, &rules);
        let second = score(&trigger, &rules);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(select(&first, &rules), select(&second, &rules));
    }
}
