use super::{input_schema, NoArgs, Tool, ToolContext, ToolOutcome};
use crate::store::StoreError;
use async_trait::async_trait;
use serde_json::{json, Value};

pub struct WinnersTool;

#[async_trait]
impl Tool for WinnersTool {
    fn name(&self) -> &'static str {
        "get_winners"
    }

    fn description(&self) -> String {
        "Get all announced Oscar winners so far.".to_string()
    }

    fn input_schema(&self) -> Value {
        input_schema::<NoArgs>()
    }

    async fn run(&self, _args: Value, ctx: &ToolContext) -> Result<ToolOutcome, StoreError> {
        let winners = ctx.store.winners().await?;
        if winners.is_empty() {
            return Ok(ToolOutcome::Success(json!({
                "message": "No winners have been announced yet.",
                "winners": [],
            })));
        }

        let mut announced = Vec::new();
        for category in ctx.catalog.categories() {
            let Some(nominee_id) = winners.get(&category.id) else {
                continue;
            };
            match category.nominee(nominee_id) {
                Some(nominee) => announced.push(json!({
                    "category": category.name,
                    "winner": nominee.title,
                    "info": nominee.info,
                    "film": nominee.film,
                })),
                None => {
                    tracing::warn!(category = %category.id, nominee = %nominee_id, "Winner not in catalog");
                }
            }
        }

        Ok(ToolOutcome::Success(json!({
            "winnersAnnounced": announced.len(),
            "totalCategories": ctx.catalog.total_categories(),
            "winners": announced,
        })))
    }
}
