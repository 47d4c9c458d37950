//! Ranking of all ballots against announced winners

use super::{decode_args, input_schema, Tool, ToolContext, ToolOutcome};
use crate::store::StoreError;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

const DEFAULT_LIMIT: usize = 10;

pub struct LeaderboardTool;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
struct LeaderboardArgs {
    /// Maximum number of entries to return (default 10)
    #[serde(default)]
    limit: Option<f64>,
}

impl LeaderboardArgs {
    /// Non-positive or missing limits fall back to the default
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn limit(&self) -> usize {
        match self.limit {
            Some(n) if n >= 1.0 => n.floor() as usize,
            _ => DEFAULT_LIMIT,
        }
    }
}

#[async_trait]
impl Tool for LeaderboardTool {
    fn name(&self) -> &'static str {
        "get_leaderboard"
    }

    fn description(&self) -> String {
        "Get the current leaderboard rankings with user names and scores.".to_string()
    }

    fn input_schema(&self) -> Value {
        input_schema::<LeaderboardArgs>()
    }

    async fn run(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, StoreError> {
        let args: LeaderboardArgs = match decode_args(args) {
            Ok(a) => a,
            Err(outcome) => return Ok(outcome),
        };

        let winners = ctx.store.winners().await?;
        if winners.is_empty() {
            return Ok(ToolOutcome::Success(json!({
                "message": "No winners have been announced yet.",
            })));
        }

        let mut scores: Vec<(String, usize)> = ctx
            .store
            .ballots()
            .await?
            .into_iter()
            .map(|ballot| {
                let score = ballot.score(&winners);
                (ballot.uid, score)
            })
            .collect();

        // Stable: ties keep scan order
        scores.sort_by(|a, b| b.1.cmp(&a.1));
        scores.truncate(args.limit());

        let mut leaderboard = Vec::with_capacity(scores.len());
        for (i, (uid, score)) in scores.into_iter().enumerate() {
            let display_name = ctx
                .store
                .user(&uid)
                .await?
                .map_or_else(|| "Unknown".to_string(), |u| u.display_name);
            leaderboard.push(json!({
                "rank": i + 1,
                "displayName": display_name,
                "score": score,
                "outOf": winners.len(),
            }));
        }

        Ok(ToolOutcome::Success(json!({
            "leaderboard": leaderboard,
            "winnersAnnounced": winners.len(),
        })))
    }
}
