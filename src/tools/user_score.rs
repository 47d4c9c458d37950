use super::{decode_args, input_schema, Tool, ToolContext, ToolOutcome};
use crate::store::StoreError;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

pub struct UserScoreTool;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
struct UserScoreArgs {
    /// Whether to include per-category breakdown
    #[serde(default)]
    include_breakdown: Option<bool>,
}

#[async_trait]
impl Tool for UserScoreTool {
    fn name(&self) -> &'static str {
        "get_user_score"
    }

    fn description(&self) -> String {
        "Get the current user's score with optional per-category breakdown.".to_string()
    }

    fn input_schema(&self) -> Value {
        input_schema::<UserScoreArgs>()
    }

    async fn run(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, StoreError> {
        let args: UserScoreArgs = match decode_args(args) {
            Ok(a) => a,
            Err(outcome) => return Ok(outcome),
        };
        let include_breakdown = args.include_breakdown.unwrap_or(false);

        let winners = ctx.store.winners().await?;
        let picks = ctx
            .store
            .ballot(&ctx.uid)
            .await?
            .map(|b| b.picks)
            .unwrap_or_default();

        let mut score = 0usize;
        let mut breakdown = Vec::new();

        for category in ctx.catalog.categories() {
            let Some(winner_id) = winners.get(&category.id) else {
                continue;
            };
            let pick_id = picks.get(&category.id);
            let correct = pick_id == Some(winner_id);
            if correct {
                score += 1;
            }

            if include_breakdown {
                let your_pick = match pick_id {
                    Some(id) => ctx.catalog.nominee_title(id).unwrap_or(id),
                    None => "No pick",
                };
                let winner = ctx.catalog.nominee_title(winner_id).unwrap_or(winner_id);
                breakdown.push(json!({
                    "category": category.name,
                    "yourPick": your_pick,
                    "winner": winner,
                    "correct": correct,
                }));
            }
        }

        let mut result = json!({
            "score": score,
            "winnersAnnounced": winners.len(),
            "totalCategories": ctx.catalog.total_categories(),
            "picksMade": picks.len(),
        });
        if !breakdown.is_empty() {
            result["breakdown"] = Value::Array(breakdown);
        }

        Ok(ToolOutcome::Success(result))
    }
}
