//! JSON Schemas for tool arguments
//!
//! Argument records derive `JsonSchema`; the generated schema is what the
//! completion endpoint sees and what returned arguments are validated
//! against before dispatch.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("invalid tool schema: {0}")]
    Schema(String),
    #[error("{0}")]
    Invalid(String),
}

/// Argument record for tools that take no parameters
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NoArgs {}

/// Closed object schema for `T`: no `$schema`/`title` keys and
/// `additionalProperties: false`
pub fn input_schema<T: JsonSchema>() -> Value {
    let mut v = serde_json::to_value(schemars::schema_for!(T))
        .unwrap_or_else(|_| json!({"type": "object", "properties": {}}));
    if let Some(obj) = v.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        obj.entry("properties").or_insert_with(|| json!({}));
        obj.insert("additionalProperties".to_string(), Value::Bool(false));
    }
    v
}

/// Validate arguments against a JSON Schema, reporting every violation
pub fn validate(schema: &Value, args: &Value) -> Result<(), SchemaError> {
    let validator =
        jsonschema::Validator::new(schema).map_err(|e| SchemaError::Schema(e.to_string()))?;
    if validator.is_valid(args) {
        return Ok(());
    }
    let errors: Vec<String> = validator.iter_errors(args).map(|e| e.to_string()).collect();
    Err(SchemaError::Invalid(errors.join("; ")))
}
