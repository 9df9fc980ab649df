//! Score command - explain how a trigger would be routed

use clap::Args;
use serde_json::json;
use switchboard_core::routing::select;
use switchboard_core::{RuleStore, Settings};

use super::{print_json, TriggerArgs};

/// Score a trigger against every specialist; neither guard is consulted
#[derive(Args, Debug)]
pub struct ScoreArgs {
    #[command(flatten)]
    pub trigger: TriggerArgs,
}

impl ScoreArgs {
    pub fn execute(&self, settings: &Settings) -> anyhow::Result<()> {
        let rules = RuleStore::load(Some(&settings.routing.rules_path))?;
        let scores = switchboard_core::routing::score(&self.trigger.to_trigger(), &rules);
        let selected = select(&scores, &rules);

        print_json(&json!({
            "minScore": rules.config().confidence_threshold.min_score,
            "scores": scores,
            "selected": selected,
        }))
    }
}
