//! Transcript and completion request/response types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of a message entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One entry of the ordered transcript exchanged with the completion endpoint.
///
/// A `FunctionCallOutput` must follow the `FunctionCall` with the same
/// `call_id` and precede any later request that depends on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscriptItem {
    Message {
        role: Role,
        content: String,
    },
    FunctionCall {
        call_id: String,
        name: String,
        /// Serialized JSON arguments, verbatim from the endpoint
        arguments: String,
    },
    FunctionCallOutput {
        call_id: String,
        /// Serialized result
        output: String,
    },
}

impl TranscriptItem {
    pub fn message(role: Role, content: impl Into<String>) -> Self {
        TranscriptItem::Message {
            role,
            content: content.into(),
        }
    }

    pub fn function_call_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        TranscriptItem::FunctionCallOutput {
            call_id: call_id.into(),
            output: output.into(),
        }
    }

    /// Build an output entry, passing strings through and serializing
    /// anything else to JSON
    pub fn function_call_output_value(call_id: impl Into<String>, output: &Value) -> Self {
        let output = match output {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self::function_call_output(call_id, output)
    }
}

/// A function call requested by the completion endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub call_id: String,
    pub name: String,
    pub arguments: String,
}

impl FunctionCall {
    pub fn new(
        call_id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// The raw call as it is recorded in the transcript
    pub fn to_transcript_item(&self) -> TranscriptItem {
        TranscriptItem::FunctionCall {
            call_id: self.call_id.clone(),
            name: self.name.clone(),
            arguments: self.arguments.clone(),
        }
    }

    /// Parse the serialized arguments
    pub fn parse_arguments(&self) -> Result<Value, serde_json::Error> {
        if self.arguments.trim().is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&self.arguments)
    }
}

/// Tool definition advertised to the completion endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Completion request
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub input: Vec<TranscriptItem>,
    pub tools: Vec<ToolDefinition>,
}

/// One output item of a completion response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputItem {
    /// Assistant message made of ordered text fragments
    Message { content: Vec<String> },
    FunctionCall(FunctionCall),
}

impl OutputItem {
    pub fn text(text: impl Into<String>) -> Self {
        OutputItem::Message {
            content: vec![text.into()],
        }
    }

    pub fn function_call(
        call_id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        OutputItem::FunctionCall(FunctionCall::new(call_id, name, arguments))
    }
}

/// Completion response
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub output: Vec<OutputItem>,
    pub usage: Usage,
}

impl LlmResponse {
    pub fn new(output: Vec<OutputItem>) -> Self {
        Self {
            output,
            usage: Usage::default(),
        }
    }

    /// Function calls in the order the endpoint returned them
    pub fn function_calls(&self) -> Vec<&FunctionCall> {
        self.output
            .iter()
            .filter_map(|item| match item {
                OutputItem::FunctionCall(call) => Some(call),
                OutputItem::Message { .. } => None,
            })
            .collect()
    }

    /// All message fragments concatenated in order
    pub fn text(&self) -> String {
        self.output
            .iter()
            .filter_map(|item| match item {
                OutputItem::Message { content } => Some(content.concat()),
                OutputItem::FunctionCall(_) => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Usage statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}
