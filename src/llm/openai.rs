//! `OpenAI` Responses API client

use super::{LlmError, LlmRequest, LlmResponse, LlmService, OutputItem, TranscriptItem, Usage};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DIRECT_RESPONSES_URL: &str = "https://api.openai.com/v1/responses";

pub struct OpenAIService {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAIService {
    pub fn new(
        api_key: String,
        model: String,
        gateway: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let base_url = match gateway {
            Some(gw) => format!("{}/openai/v1/responses", gw.trim_end_matches('/')),
            None => DIRECT_RESPONSES_URL.to_string(),
        };

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn translate_request(&self, request: &LlmRequest) -> ResponsesApiRequest {
        let input = request
            .input
            .iter()
            .map(|item| match item {
                TranscriptItem::Message { role, content } => ResponsesApiInputItem::Message {
                    role: role.as_str().to_string(),
                    content: content.clone(),
                },
                TranscriptItem::FunctionCall {
                    call_id,
                    name,
                    arguments,
                } => ResponsesApiInputItem::FunctionCall {
                    call_id: call_id.clone(),
                    name: name.clone(),
                    arguments: arguments.clone(),
                },
                TranscriptItem::FunctionCallOutput { call_id, output } => {
                    ResponsesApiInputItem::FunctionCallOutput {
                        call_id: call_id.clone(),
                        output: output.clone(),
                    }
                }
            })
            .collect();

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|t| ResponsesApiTool {
                        r#type: "function".to_string(),
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.input_schema.clone(),
                    })
                    .collect(),
            )
        };

        ResponsesApiRequest {
            model: self.model.clone(),
            input,
            tools,
        }
    }

    fn normalize_response(resp: ResponsesApiResponse) -> LlmResponse {
        let mut output = Vec::new();

        for item in resp.output {
            match item.r#type.as_str() {
                "message" => {
                    let fragments: Vec<String> = item
                        .content
                        .unwrap_or_default()
                        .into_iter()
                        .filter(|c| c.r#type == "output_text")
                        .filter_map(|c| c.text)
                        .collect();
                    output.push(OutputItem::Message { content: fragments });
                }
                "function_call" => {
                    if let (Some(name), Some(call_id)) = (item.name, item.call_id) {
                        output.push(OutputItem::function_call(
                            call_id,
                            name,
                            item.arguments.unwrap_or_default(),
                        ));
                    } else {
                        tracing::warn!("Dropping function_call output without name or call_id");
                    }
                }
                "reasoning" => {}
                other => {
                    tracing::debug!(output_type = %other, "Ignoring unknown output type");
                }
            }
        }

        let usage = resp.usage.map_or_else(Usage::default, |u| Usage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
        });

        LlmResponse { output, usage }
    }
}

#[async_trait]
impl LlmService for OpenAIService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let body = self.translate_request(request);

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::timeout(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::network(format!("Connection failed: {e}"))
                } else {
                    LlmError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<OpenAIErrorResponse>(&text)
                .map_or(text, |e| e.error.message);
            return Err(LlmError::from_status(status.as_u16(), &message));
        }

        let parsed: ResponsesApiResponse = serde_json::from_str(&text)
            .map_err(|e| LlmError::malformed(format!("Failed to parse response: {e}")))?;

        Ok(Self::normalize_response(parsed))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct ResponsesApiRequest {
    model: String,
    input: Vec<ResponsesApiInputItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ResponsesApiTool>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponsesApiInputItem {
    Message {
        role: String,
        content: String,
    },
    FunctionCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    FunctionCallOutput {
        call_id: String,
        output: String,
    },
}

#[derive(Debug, Serialize)]
struct ResponsesApiTool {
    r#type: String,
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub(super) struct ResponsesApiResponse {
    #[serde(default)]
    output: Vec<ResponsesApiOutput>,
    #[serde(default)]
    usage: Option<ResponsesApiUsage>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ResponsesApiOutput {
    r#type: String,
    #[serde(default)]
    content: Option<Vec<ResponsesApiContent>>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
    #[serde(default)]
    call_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ResponsesApiContent {
    r#type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponsesApiUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
}

#[cfg(test)]
pub(super) fn normalize(resp: ResponsesApiResponse) -> LlmResponse {
    OpenAIService::normalize_response(resp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Role, ToolDefinition};
    use serde_json::json;

    fn service(gateway: Option<&str>) -> OpenAIService {
        OpenAIService::new(
            "key".to_string(),
            "gpt-5.2".to_string(),
            gateway,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_base_url_selection() {
        assert_eq!(service(None).base_url(), DIRECT_RESPONSES_URL);
        assert_eq!(
            service(Some("http://gw.local/")).base_url(),
            "http://gw.local/openai/v1/responses"
        );
    }

    #[test]
    fn test_translate_request_keeps_transcript_order() {
        let request = LlmRequest {
            input: vec![
                TranscriptItem::message(Role::System, "sys"),
                TranscriptItem::message(Role::User, "who won?"),
                TranscriptItem::FunctionCall {
                    call_id: "c1".to_string(),
                    name: "get_winners".to_string(),
                    arguments: "{}".to_string(),
                },
                TranscriptItem::function_call_output("c1", "{\"winners\":[]}"),
            ],
            tools: vec![ToolDefinition {
                name: "get_winners".to_string(),
                description: "d".to_string(),
                input_schema: json!({"type": "object"}),
            }],
        };

        let wire = serde_json::to_value(service(None).translate_request(&request)).unwrap();
        assert_eq!(wire["model"], "gpt-5.2");
        assert_eq!(wire["input"][0], json!({"type": "message", "role": "system", "content": "sys"}));
        assert_eq!(wire["input"][2]["type"], "function_call");
        assert_eq!(wire["input"][3], json!({"type": "function_call_output", "call_id": "c1", "output": "{\"winners\":[]}"}));
        assert_eq!(wire["tools"][0]["type"], "function");
        assert_eq!(wire["tools"][0]["parameters"], json!({"type": "object"}));
    }

    #[test]
    fn test_normalize_skips_reasoning_and_keeps_order() {
        let body = json!({
            "status": "completed",
            "output": [
                {"type": "reasoning", "summary": []},
                {"type": "function_call", "name": "get_leaderboard", "arguments": "{\"limit\":3}", "call_id": "c1"},
                {"type": "message", "content": [
                    {"type": "output_text", "text": "Hi "},
                    {"type": "refusal", "refusal": "no"},
                    {"type": "output_text", "text": "there"}
                ]}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 4}
        });
        let resp: ResponsesApiResponse = serde_json::from_value(body).unwrap();
        let normalized = normalize(resp);

        assert_eq!(normalized.output.len(), 2);
        assert_eq!(
            normalized.output[0],
            OutputItem::function_call("c1", "get_leaderboard", "{\"limit\":3}")
        );
        assert_eq!(normalized.text(), "Hi there");
        assert_eq!(normalized.usage.input_tokens, 10);
    }

    #[test]
    fn test_normalize_drops_incomplete_function_call() {
        let body = json!({"output": [{"type": "function_call", "arguments": "{}"}]});
        let resp: ResponsesApiResponse = serde_json::from_value(body).unwrap();
        assert!(normalize(resp).output.is_empty());
    }
}
