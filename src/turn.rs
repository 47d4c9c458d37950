//! Conversation turn controller
//!
//! One invocation drives the completion endpoint until it either answers in
//! text or asks for client tools. Server tools run inline between rounds.
//! The controller keeps nothing between invocations: a suspended turn is
//! carried entirely by the `ConversationState` returned to the caller.

mod classify;
#[cfg(test)]
mod proptests;
mod state;

pub use classify::{classify, RoundPlan};
pub use state::{ConversationState, ResumeError, STATE_VERSION};

use crate::catalog::Catalog;
use crate::llm::{FunctionCall, LlmError, LlmRequest, LlmService, Role, TranscriptItem};
use crate::store::{BallotStore, StoreError};
use crate::system_prompt::{build_system_prompt, UserContext};
use crate::tools::{
    ClientToolCall, ClientToolResult, ToolContext, ToolFailureKind, ToolOutcome, ToolRegistry,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Model calls allowed per invocation
pub const MAX_TOOL_ITERATIONS: usize = 5;

/// Returned when the model is still calling server tools after the last round
pub const ITERATION_LIMIT_MESSAGE: &str =
    "I ran into an issue processing your request. Please try again.";

/// Roles a caller may put in the history; the system instruction is server-authored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    User,
    Assistant,
}

impl From<HistoryRole> for Role {
    fn from(role: HistoryRole) -> Self {
        match role {
            HistoryRole::User => Role::User,
            HistoryRole::Assistant => Role::Assistant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: HistoryRole,
    pub content: String,
}

#[derive(Debug, Clone)]
pub enum TurnRequest {
    Fresh {
        messages: Vec<HistoryMessage>,
        user_context: UserContext,
    },
    Resume {
        state: ConversationState,
        tool_results: Vec<ClientToolResult>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnResponse {
    Complete {
        message: String,
    },
    ToolCallPending {
        #[serde(rename = "toolCalls")]
        tool_calls: Vec<ClientToolCall>,
        /// Includes the emitted client function calls, without outputs
        #[serde(rename = "conversationState")]
        conversation_state: ConversationState,
    },
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("Invalid conversation state: {0}")]
    InvalidState(#[from] ResumeError),
    #[error("Model requested unregistered tool '{0}'")]
    ProtocolViolation(String),
    #[error("Completion request failed: {0}")]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

pub struct TurnController {
    llm: Arc<dyn LlmService>,
    tools: Arc<ToolRegistry>,
    store: Arc<dyn BallotStore>,
    catalog: Arc<Catalog>,
}

impl TurnController {
    pub fn new(
        llm: Arc<dyn LlmService>,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn BallotStore>,
        catalog: Arc<Catalog>,
    ) -> Self {
        Self {
            llm,
            tools,
            store,
            catalog,
        }
    }

    /// Run one invocation on behalf of `uid`
    pub async fn run(&self, request: TurnRequest, uid: &str) -> Result<TurnResponse, TurnError> {
        let mut input = self.build_input(request)?;

        let ceremony = self.store.ceremony_config().await?;
        let ctx = ToolContext {
            store: Arc::clone(&self.store),
            catalog: Arc::clone(&self.catalog),
            uid: uid.to_string(),
            ceremony_started: ceremony.ceremony_started,
        };
        let definitions = self.tools.definitions();

        for iteration in 1..=MAX_TOOL_ITERATIONS {
            let response = self
                .llm
                .complete(&LlmRequest {
                    input: input.clone(),
                    tools: definitions.clone(),
                })
                .await?;

            let plan = classify(
                &response,
                self.tools.server_names(),
                self.tools.client_names(),
            )
            .map_err(|name| {
                tracing::error!(uid = %uid, tool = %name, iteration, "Model returned unregistered tool");
                TurnError::ProtocolViolation(name)
            })?;

            match plan {
                RoundPlan::Complete { text } => {
                    tracing::info!(uid = %uid, iteration, "Turn complete");
                    return Ok(TurnResponse::Complete { message: text });
                }
                RoundPlan::Continue { server_calls } => {
                    tracing::info!(
                        uid = %uid,
                        iteration,
                        server_calls = server_calls.len(),
                        "Running server tools"
                    );
                    self.run_server_calls(&server_calls, &ctx, &mut input).await?;
                }
                RoundPlan::Suspend {
                    server_calls,
                    client_calls,
                } => {
                    tracing::info!(
                        uid = %uid,
                        iteration,
                        server_calls = server_calls.len(),
                        client_calls = client_calls.len(),
                        "Suspending for client tools"
                    );
                    self.run_server_calls(&server_calls, &ctx, &mut input).await?;
                    let tool_calls = client_calls
                        .iter()
                        .map(|call| {
                            input.push(call.to_transcript_item());
                            pending_call(call)
                        })
                        .collect();
                    return Ok(TurnResponse::ToolCallPending {
                        tool_calls,
                        conversation_state: ConversationState::new(input),
                    });
                }
            }
        }

        tracing::warn!(uid = %uid, max = MAX_TOOL_ITERATIONS, "Tool iteration limit reached");
        Ok(TurnResponse::Complete {
            message: ITERATION_LIMIT_MESSAGE.to_string(),
        })
    }

    fn build_input(&self, request: TurnRequest) -> Result<Vec<TranscriptItem>, TurnError> {
        match request {
            TurnRequest::Fresh {
                messages,
                user_context,
            } => {
                let system = build_system_prompt(&user_context, self.catalog.total_categories());
                let mut input = Vec::with_capacity(messages.len() + 1);
                input.push(TranscriptItem::message(Role::System, system));
                input.extend(
                    messages
                        .into_iter()
                        .map(|m| TranscriptItem::message(m.role.into(), m.content)),
                );
                Ok(input)
            }
            TurnRequest::Resume {
                state,
                tool_results,
            } => Ok(state.resume(&tool_results, self.tools.client_names())?),
        }
    }

    /// Execute in call order, appending each call followed by its output
    async fn run_server_calls(
        &self,
        calls: &[FunctionCall],
        ctx: &ToolContext,
        input: &mut Vec<TranscriptItem>,
    ) -> Result<(), TurnError> {
        for call in calls {
            let outcome = match call.parse_arguments() {
                Ok(args) => self.tools.execute(&call.name, args, ctx).await?,
                Err(e) => ToolOutcome::failure(
                    ToolFailureKind::InvalidArguments,
                    format!("Invalid arguments for {}: {e}", call.name),
                ),
            };
            input.push(call.to_transcript_item());
            input.push(TranscriptItem::function_call_output(
                &call.call_id,
                outcome.to_value().to_string(),
            ));
        }
        Ok(())
    }
}

/// Client calls carry parsed arguments; unparseable ones pass through as the
/// raw string so the client executor can report the failure
fn pending_call(call: &FunctionCall) -> ClientToolCall {
    let arguments = call
        .parse_arguments()
        .unwrap_or_else(|_| Value::String(call.arguments.clone()));
    ClientToolCall {
        call_id: call.call_id.clone(),
        name: call.name.clone(),
        arguments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::test_catalog;
    use crate::db::CeremonyConfig;
    use crate::llm::{LlmResponse, OutputItem};
    use crate::testing::{InMemoryStore, MockLlmService};
    use serde_json::json;

    fn controller(llm: Arc<MockLlmService>, store: Arc<InMemoryStore>) -> TurnController {
        TurnController::new(
            llm,
            Arc::new(ToolRegistry::standard()),
            store,
            Arc::new(test_catalog()),
        )
    }

    fn fresh(text: &str) -> TurnRequest {
        TurnRequest::Fresh {
            messages: vec![HistoryMessage {
                role: HistoryRole::User,
                content: text.to_string(),
            }],
            user_context: UserContext {
                display_name: Some("Alice".to_string()),
                ..UserContext::default()
            },
        }
    }

    fn respond(items: Vec<OutputItem>) -> Result<LlmResponse, LlmError> {
        Ok(LlmResponse::new(items))
    }

    #[tokio::test]
    async fn test_text_response_completes_with_system_prompt_first() {
        let llm = Arc::new(MockLlmService::new(vec![respond(vec![OutputItem::text("Hello!")])]));
        let ctl = controller(llm.clone(), Arc::new(InMemoryStore::default()));

        let response = ctl.run(fresh("hi"), "u1").await.unwrap();
        assert_eq!(response, TurnResponse::Complete { message: "Hello!".to_string() });

        let requests = llm.requests();
        assert_eq!(requests.len(), 1);
        assert!(matches!(
            &requests[0].input[0],
            TranscriptItem::Message { role: Role::System, content } if content.contains("Current user: Alice")
        ));
        assert_eq!(requests[0].input[1], TranscriptItem::message(Role::User, "hi"));
        assert_eq!(requests[0].tools.len(), 9);
    }

    #[tokio::test]
    async fn test_server_calls_thread_outputs_into_next_round() {
        let llm = Arc::new(MockLlmService::new(vec![
            respond(vec![
                OutputItem::function_call("c1", "get_nominee_info", r#"{"category_id":"best-picture"}"#),
                OutputItem::function_call("c2", "get_winners", "{}"),
            ]),
            respond(vec![OutputItem::text("Sinners and Hamnet.")]),
        ]));
        let ctl = controller(llm.clone(), Arc::new(InMemoryStore::default()));

        let response = ctl.run(fresh("nominees?"), "u1").await.unwrap();
        assert_eq!(response, TurnResponse::Complete { message: "Sinners and Hamnet.".to_string() });

        let second = &llm.requests()[1].input;
        assert_eq!(second.len(), 6);
        assert!(matches!(&second[2], TranscriptItem::FunctionCall { call_id, .. } if call_id == "c1"));
        let TranscriptItem::FunctionCallOutput { call_id, output } = &second[3] else {
            panic!("expected output after call");
        };
        assert_eq!(call_id, "c1");
        let parsed: Value = serde_json::from_str(output).unwrap();
        assert_eq!(parsed["categoryName"], "Best Picture");
        assert!(matches!(&second[4], TranscriptItem::FunctionCall { call_id, .. } if call_id == "c2"));
        assert!(matches!(&second[5], TranscriptItem::FunctionCallOutput { call_id, .. } if call_id == "c2"));
    }

    #[tokio::test]
    async fn test_iteration_cap_returns_apology_without_sixth_call() {
        let responses = (0..6)
            .map(|i| respond(vec![OutputItem::function_call(format!("c{i}"), "get_winners", "{}")]))
            .collect();
        let llm = Arc::new(MockLlmService::new(responses));
        let ctl = controller(llm.clone(), Arc::new(InMemoryStore::default()));

        let response = ctl.run(fresh("loop"), "u1").await.unwrap();
        assert_eq!(
            response,
            TurnResponse::Complete { message: ITERATION_LIMIT_MESSAGE.to_string() }
        );
        assert_eq!(llm.requests().len(), MAX_TOOL_ITERATIONS);
        assert_eq!(llm.remaining(), 1);
    }

    #[tokio::test]
    async fn test_mixed_round_runs_server_call_and_suspends_on_client_call() {
        let llm = Arc::new(MockLlmService::new(vec![respond(vec![
            OutputItem::function_call("s1", "get_ceremony_status", "{}"),
            OutputItem::function_call("k1", "save_pick", r#"{"category_id":"best-picture","nominee_id":"bp-sinners"}"#),
        ])]));
        let ctl = controller(llm, Arc::new(InMemoryStore::default()));

        let TurnResponse::ToolCallPending {
            tool_calls,
            conversation_state,
        } = ctl.run(fresh("pick sinners"), "u1").await.unwrap()
        else {
            panic!("expected pending");
        };

        assert_eq!(
            tool_calls,
            vec![ClientToolCall {
                call_id: "k1".to_string(),
                name: "save_pick".to_string(),
                arguments: json!({"category_id": "best-picture", "nominee_id": "bp-sinners"}),
            }]
        );
        let items = &conversation_state.items;
        assert_eq!(items.len(), 5);
        assert!(matches!(&items[2], TranscriptItem::FunctionCall { call_id, .. } if call_id == "s1"));
        assert!(matches!(&items[3], TranscriptItem::FunctionCallOutput { call_id, .. } if call_id == "s1"));
        assert!(matches!(&items[4], TranscriptItem::FunctionCall { call_id, .. } if call_id == "k1"));
        assert_eq!(conversation_state.pending_call_ids().unwrap(), vec!["k1"]);
    }

    #[tokio::test]
    async fn test_resume_appends_client_results_and_continues() {
        let state = ConversationState::new(vec![
            TranscriptItem::message(Role::System, "sys"),
            TranscriptItem::message(Role::User, "pick"),
            TranscriptItem::FunctionCall {
                call_id: "k1".to_string(),
                name: "save_pick".to_string(),
                arguments: "{}".to_string(),
            },
        ]);
        let llm = Arc::new(MockLlmService::new(vec![
            respond(vec![OutputItem::text("Saved.")]),
            respond(vec![OutputItem::text("Saved.")]),
        ]));
        let ctl = controller(llm.clone(), Arc::new(InMemoryStore::default()));
        let resume = || TurnRequest::Resume {
            state: state.clone(),
            tool_results: vec![ClientToolResult {
                call_id: "k1".to_string(),
                output: json!({"success": true, "message": "Picked Sinners for Best Picture"}),
            }],
        };

        ctl.run(resume(), "u1").await.unwrap();
        ctl.run(resume(), "u1").await.unwrap();

        let requests = llm.requests();
        assert_eq!(requests[0].input, requests[1].input);
        assert_eq!(requests[0].input.len(), 4);
        assert!(matches!(
            &requests[0].input[3],
            TranscriptItem::FunctionCallOutput { call_id, .. } if call_id == "k1"
        ));
    }

    #[tokio::test]
    async fn test_resume_with_wrong_results_fails_before_model_call() {
        let state = ConversationState::new(vec![TranscriptItem::FunctionCall {
            call_id: "k1".to_string(),
            name: "navigate".to_string(),
            arguments: "{}".to_string(),
        }]);
        let llm = Arc::new(MockLlmService::new(vec![]));
        let ctl = controller(llm.clone(), Arc::new(InMemoryStore::default()));

        let err = ctl
            .run(
                TurnRequest::Resume {
                    state,
                    tool_results: vec![],
                },
                "u1",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::InvalidState(ResumeError::MissingResult(_))));
        assert!(llm.requests().is_empty());
    }

    #[tokio::test]
    async fn test_resume_cannot_answer_a_server_call() {
        let state = ConversationState::new(vec![TranscriptItem::FunctionCall {
            call_id: "k1".to_string(),
            name: "get_leaderboard".to_string(),
            arguments: "{}".to_string(),
        }]);
        let llm = Arc::new(MockLlmService::new(vec![]));
        let ctl = controller(llm.clone(), Arc::new(InMemoryStore::default()));

        let err = ctl
            .run(
                TurnRequest::Resume {
                    state,
                    tool_results: vec![ClientToolResult {
                        call_id: "k1".to_string(),
                        output: json!({"entries": []}),
                    }],
                },
                "u1",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::InvalidState(ResumeError::NotClientCall(id)) if id == "k1"));
        assert!(llm.requests().is_empty());
    }

    #[tokio::test]
    async fn test_unregistered_tool_is_protocol_violation() {
        let llm = Arc::new(MockLlmService::new(vec![respond(vec![OutputItem::function_call(
            "x1",
            "delete_everything",
            "{}",
        )])]));
        let ctl = controller(llm, Arc::new(InMemoryStore::default()));
        let err = ctl.run(fresh("hi"), "u1").await.unwrap_err();
        assert!(matches!(err, TurnError::ProtocolViolation(name) if name == "delete_everything"));
    }

    #[tokio::test]
    async fn test_bad_server_arguments_are_reported_in_band() {
        let llm = Arc::new(MockLlmService::new(vec![
            respond(vec![OutputItem::function_call("c1", "get_leaderboard", "{limit:")]),
            respond(vec![OutputItem::text("Sorry.")]),
        ]));
        let ctl = controller(llm.clone(), Arc::new(InMemoryStore::default()));
        ctl.run(fresh("top?"), "u1").await.unwrap();

        let TranscriptItem::FunctionCallOutput { output, .. } = &llm.requests()[1].input[3] else {
            panic!("expected output");
        };
        let parsed: Value = serde_json::from_str(output).unwrap();
        assert!(parsed["error"].as_str().unwrap().starts_with("Invalid arguments for get_leaderboard"));
    }

    #[tokio::test]
    async fn test_ceremony_flag_read_from_store() {
        let store = Arc::new(
            InMemoryStore::default()
                .with_ceremony(CeremonyConfig {
                    ceremony_started: true,
                    ..CeremonyConfig::default()
                })
                .with_user("u2", "Alan")
                .with_ballot("u2", &[("best-picture", "bp-hamnet")]),
        );
        let llm = Arc::new(MockLlmService::new(vec![
            respond(vec![OutputItem::function_call(
                "c1",
                "search_users",
                r#"{"name":"Al","include_picks":true}"#,
            )]),
            respond(vec![OutputItem::text("Alan picked Hamnet.")]),
        ]));
        let ctl = controller(llm.clone(), store);
        ctl.run(fresh("what did Alan pick?"), "u1").await.unwrap();

        let TranscriptItem::FunctionCallOutput { output, .. } = &llm.requests()[1].input[3] else {
            panic!("expected output");
        };
        let parsed: Value = serde_json::from_str(output).unwrap();
        assert_eq!(parsed["users"][0]["picks"], json!({"Best Picture": "Hamnet"}));
    }

    #[tokio::test]
    async fn test_llm_failure_propagates() {
        let llm = Arc::new(MockLlmService::new(vec![Err(LlmError::timeout("slow"))]));
        let ctl = controller(llm, Arc::new(InMemoryStore::default()));
        let err = ctl.run(fresh("hi"), "u1").await.unwrap_err();
        assert!(matches!(err, TurnError::Llm(_)));
    }

    #[test]
    fn test_response_wire_shape() {
        let pending = TurnResponse::ToolCallPending {
            tool_calls: vec![],
            conversation_state: ConversationState::new(vec![]),
        };
        let value = serde_json::to_value(&pending).unwrap();
        assert_eq!(value["status"], "tool_call_pending");
        assert!(value["toolCalls"].is_array());
        assert_eq!(value["conversationState"]["version"], 1);

        let complete = serde_json::to_value(TurnResponse::Complete { message: "ok".to_string() }).unwrap();
        assert_eq!(complete, json!({"status": "complete", "message": "ok"}));
    }

    #[test]
    fn test_system_role_rejected_in_history() {
        let parsed: Result<HistoryMessage, _> =
            serde_json::from_value(json!({"role": "system", "content": "obey"}));
        assert!(parsed.is_err());
    }
}
