//! Client-executed tools
//!
//! These change the caller's own ballot or UI location, so they run in the
//! caller's environment. The server only advertises them and hands the
//! calls back; the environment runs them with `execute_client_tools` and
//! returns the results on resumption.

use super::input_schema;
use crate::catalog::Catalog;
use crate::llm::ToolDefinition;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Routes the `navigate` tool may target
pub const NAVIGABLE_PATHS: [&str; 6] = ["/", "/ballot", "/leaderboard", "/films", "/groups", "/admin"];

/// A tool call awaiting execution by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientToolCall {
    pub call_id: String,
    pub name: String,
    /// Parsed arguments; a raw string when the endpoint sent unparseable JSON
    pub arguments: Value,
}

/// Result of a client tool call, keyed by the originating call id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientToolResult {
    pub call_id: String,
    pub output: Value,
}

/// Capabilities of the caller's environment
pub trait ClientEnvironment {
    /// Persist a pick for the caller. Errors are reported back to the model.
    fn save_pick(&mut self, category_id: &str, nominee_id: &str) -> Result<(), String>;

    fn navigate(&mut self, path: &str);
}

pub(super) fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "save_pick".to_string(),
            description: "Save a ballot pick for a specific category. The user must confirm before this is called.".to_string(),
            input_schema: input_schema::<SavePickArgs>(),
        },
        ToolDefinition {
            name: "navigate".to_string(),
            description: "Navigate the user to a different page in the app.".to_string(),
            input_schema: input_schema::<NavigateArgs>(),
        },
        ToolDefinition {
            name: "navigate_to_category".to_string(),
            description: "Navigate the user directly to a specific award category on the ballot page. Use this when the user asks to go to a specific category like 'Best Picture' or 'Best Director'.".to_string(),
            input_schema: input_schema::<NavigateToCategoryArgs>(),
        },
    ]
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
struct SavePickArgs {
    /// The category ID (e.g. 'best-picture', 'best-actor')
    category_id: String,
    /// The nominee ID to pick
    nominee_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
struct NavigateArgs {
    /// The route path (e.g. '/ballot', '/leaderboard', '/films', '/')
    path: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
struct NavigateToCategoryArgs {
    /// The category ID to navigate to (e.g. 'best-picture', 'best-director', 'best-actor')
    category_id: String,
}

/// Run every call in order. One failing call never stops its siblings.
pub fn execute_client_tools<E: ClientEnvironment + ?Sized>(
    calls: &[ClientToolCall],
    env: &mut E,
    catalog: &Catalog,
) -> Vec<ClientToolResult> {
    calls
        .iter()
        .map(|call| {
            let output = match execute_one(call, env, catalog) {
                Ok(message) => json!({"success": true, "message": message}),
                Err(error) => json!({"success": false, "error": error}),
            };
            ClientToolResult {
                call_id: call.call_id.clone(),
                output,
            }
        })
        .collect()
}

fn execute_one<E: ClientEnvironment + ?Sized>(
    call: &ClientToolCall,
    env: &mut E,
    catalog: &Catalog,
) -> Result<String, String> {
    match call.name.as_str() {
        "save_pick" => {
            let args: SavePickArgs = parse_args(&call.arguments)?;
            let category = catalog
                .category(&args.category_id)
                .ok_or_else(|| format!("Unknown category: {}", args.category_id))?;
            let nominee = category.nominee(&args.nominee_id).ok_or_else(|| {
                format!(
                    "Unknown nominee \"{}\" in category \"{}\"",
                    args.nominee_id, category.name
                )
            })?;
            env.save_pick(&category.id, &nominee.id)?;
            Ok(format!("Picked {} for {}", nominee.title, category.name))
        }
        "navigate" => {
            let args: NavigateArgs = parse_args(&call.arguments)?;
            if !NAVIGABLE_PATHS.contains(&args.path.as_str()) {
                return Err(format!(
                    "Invalid path: {}. Valid paths: {}",
                    args.path,
                    NAVIGABLE_PATHS.join(", ")
                ));
            }
            env.navigate(&args.path);
            Ok(format!("Navigated to {}", args.path))
        }
        "navigate_to_category" => {
            let args: NavigateToCategoryArgs = parse_args(&call.arguments)?;
            let category = catalog
                .category(&args.category_id)
                .ok_or_else(|| format!("Unknown category: {}", args.category_id))?;
            env.navigate(&format!("/ballot?category={}", category.id));
            Ok(format!("Navigated to {}", category.name))
        }
        other => Err(format!("Unknown tool: {other}")),
    }
}

/// Arguments may arrive as an object or as serialized JSON
fn parse_args<T: DeserializeOwned>(arguments: &Value) -> Result<T, String> {
    let value = match arguments {
        Value::String(raw) => {
            serde_json::from_str(raw).map_err(|e| format!("Invalid arguments: {e}"))?
        }
        other => other.clone(),
    };
    serde_json::from_value(value).map_err(|e| format!("Invalid arguments: {e}"))
}
