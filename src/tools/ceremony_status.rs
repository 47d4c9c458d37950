use super::{input_schema, NoArgs, Tool, ToolContext, ToolOutcome};
use crate::store::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

pub struct CeremonyStatusTool;

#[async_trait]
impl Tool for CeremonyStatusTool {
    fn name(&self) -> &'static str {
        "get_ceremony_status"
    }

    fn description(&self) -> String {
        "Get the current ceremony status including lock state, whether the ceremony has started, and how many winners have been announced.".to_string()
    }

    fn input_schema(&self) -> Value {
        input_schema::<NoArgs>()
    }

    async fn run(&self, _args: Value, ctx: &ToolContext) -> Result<ToolOutcome, StoreError> {
        let config = ctx.store.ceremony_config().await?;
        let winners = ctx.store.winners().await?;

        Ok(ToolOutcome::Success(json!({
            "isLocked": config.is_locked_at(Utc::now()),
            "ceremonyStarted": config.ceremony_started,
            "lockTime": config.lock_time.map(|t| t.to_rfc3339()),
            "winnersAnnounced": winners.len(),
            "totalCategories": ctx.catalog.total_categories(),
        })))
    }
}
