//! Display-name search with ceremony-gated pick disclosure

use super::{decode_args, input_schema, Tool, ToolContext, ToolFailureKind, ToolOutcome};
use crate::store::StoreError;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Map, Value};

const MIN_QUERY_CHARS: usize = 2;
const MAX_RESULTS: usize = 10;
const PICKS_HIDDEN_NOTE: &str = "Picks are hidden until the ceremony starts.";

pub struct SearchUsersTool;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
struct SearchUsersArgs {
    /// Name or partial name to search for
    name: String,
    /// Whether to include the user's picks in the results (only works after ceremony starts)
    #[serde(default)]
    include_picks: Option<bool>,
}

#[async_trait]
impl Tool for SearchUsersTool {
    fn name(&self) -> &'static str {
        "search_users"
    }

    fn description(&self) -> String {
        "Search for users by display name. Returns profile info and optionally their picks (only if ceremony has started).".to_string()
    }

    fn input_schema(&self) -> Value {
        input_schema::<SearchUsersArgs>()
    }

    async fn run(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, StoreError> {
        let args: SearchUsersArgs = match decode_args(args) {
            Ok(a) => a,
            Err(outcome) => return Ok(outcome),
        };

        if args.name.chars().count() < MIN_QUERY_CHARS {
            return Ok(ToolOutcome::failure(
                ToolFailureKind::InvalidQuery,
                "Search query must be at least 2 characters.",
            ));
        }

        let include_picks = args.include_picks.unwrap_or(false);
        let profiles = ctx
            .store
            .users_with_name_prefix(&args.name, MAX_RESULTS)
            .await?;

        let mut users = Vec::with_capacity(profiles.len());
        for profile in profiles {
            let mut user = Map::new();
            user.insert("uid".to_string(), json!(profile.uid));
            user.insert("displayName".to_string(), json!(profile.display_name));

            if include_picks && ctx.ceremony_started {
                if let Some(ballot) = ctx.store.ballot(&profile.uid).await? {
                    let mut picks = Map::new();
                    for (category_id, nominee_id) in &ballot.picks {
                        let category = ctx.catalog.category(category_id);
                        let nominee = category.and_then(|c| c.nominee(nominee_id));
                        if let (Some(category), Some(nominee)) = (category, nominee) {
                            picks.insert(category.name.clone(), json!(nominee.title));
                        }
                    }
                    user.insert("picks".to_string(), Value::Object(picks));
                }
            } else if include_picks {
                user.insert("picksNote".to_string(), json!(PICKS_HIDDEN_NOTE));
            }

            users.push(Value::Object(user));
        }

        if users.is_empty() {
            return Ok(ToolOutcome::Success(json!({
                "message": format!("No users found matching '{}'.", args.name),
            })));
        }

        Ok(ToolOutcome::Success(json!({ "users": users })))
    }
}
