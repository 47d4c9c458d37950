//! Nominee lookup by category id or free text

use super::{decode_args, input_schema, Tool, ToolContext, ToolFailureKind, ToolOutcome};
use crate::store::StoreError;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

pub struct NomineeInfoTool;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
struct NomineeInfoArgs {
    /// Free-text search for a film, person, or category name (e.g. 'Sinners', 'Best Picture', 'Timothee Chalamet')
    #[serde(default)]
    query: Option<String>,
    /// Exact category ID to look up (e.g. 'best-picture', 'best-actor')
    #[serde(default)]
    category_id: Option<String>,
}

#[async_trait]
impl Tool for NomineeInfoTool {
    fn name(&self) -> &'static str {
        "get_nominee_info"
    }

    fn description(&self) -> String {
        "Look up Oscar nominee information by search query or category. Returns categories, nominees, and film details.".to_string()
    }

    fn input_schema(&self) -> Value {
        input_schema::<NomineeInfoArgs>()
    }

    async fn run(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, StoreError> {
        let args: NomineeInfoArgs = match decode_args(args) {
            Ok(a) => a,
            Err(outcome) => return Ok(outcome),
        };
        let catalog = &ctx.catalog;

        // Empty strings are treated as not supplied
        if let Some(category_id) = args.category_id.filter(|s| !s.is_empty()) {
            let Some(category) = catalog.category(&category_id) else {
                return Ok(ToolOutcome::failure(
                    ToolFailureKind::NotFound,
                    format!("Category '{category_id}' not found."),
                ));
            };
            return Ok(ToolOutcome::Success(json!({
                "categoryId": category.id,
                "categoryName": category.name,
                "nominees": category.nominees,
            })));
        }

        if let Some(query) = args.query.filter(|s| !s.is_empty()) {
            let results = catalog.search(&query);
            if results.is_empty() {
                return Ok(ToolOutcome::Success(json!({
                    "message": format!("No results found for '{query}'."),
                })));
            }
            return Ok(ToolOutcome::Success(json!({ "results": results })));
        }

        let categories: Vec<Value> = catalog
            .categories()
            .iter()
            .map(|c| {
                json!({
                    "id": c.id,
                    "name": c.name,
                    "nomineeCount": c.nominees.len(),
                })
            })
            .collect();
        Ok(ToolOutcome::Success(json!({
            "totalCategories": catalog.total_categories(),
            "categories": categories,
        })))
    }
}
