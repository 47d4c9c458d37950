//! Tool registry and server tool execution
//!
//! Tools are partitioned by where they run. Server tools read durable state
//! inside this process. Client tools change the caller's own ballot or UI
//! location and are only ever executed by the caller's environment; the
//! registry carries their definitions so they can be advertised.

mod ceremony_status;
pub mod client;
mod leaderboard;
mod nominee_info;
pub mod schema;
mod search_users;
mod user_score;
mod winners;

pub use ceremony_status::CeremonyStatusTool;
pub use client::{execute_client_tools, ClientEnvironment, ClientToolCall, ClientToolResult};
pub use leaderboard::LeaderboardTool;
pub use nominee_info::NomineeInfoTool;
pub use schema::{input_schema, NoArgs, SchemaError};
pub use search_users::SearchUsersTool;
pub use user_score::UserScoreTool;
pub use winners::WinnersTool;

use crate::catalog::Catalog;
use crate::llm::ToolDefinition;
use crate::store::{BallotStore, StoreError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Everything a server tool may read. Built fresh for each turn.
#[derive(Clone)]
pub struct ToolContext {
    pub store: Arc<dyn BallotStore>,
    pub catalog: Arc<Catalog>,
    /// Caller identity; tools never act on behalf of another user
    pub uid: String,
    pub ceremony_started: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolFailureKind {
    NotFound,
    InvalidArguments,
    InvalidQuery,
    UnknownTool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFailure {
    pub kind: ToolFailureKind,
    pub message: String,
}

/// Result of a server tool. Failures are data handed back to the model,
/// never errors raised to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success(Value),
    Failure(ToolFailure),
}

impl ToolOutcome {
    pub fn failure(kind: ToolFailureKind, message: impl Into<String>) -> Self {
        ToolOutcome::Failure(ToolFailure {
            kind,
            message: message.into(),
        })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ToolOutcome::Failure(_))
    }

    /// Payload recorded as the function call output
    pub fn to_value(&self) -> Value {
        match self {
            ToolOutcome::Success(v) => v.clone(),
            ToolOutcome::Failure(f) => json!({"error": f.message}),
        }
    }
}

/// A tool executed in-process against durable state
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    /// Tool description for the model
    fn description(&self) -> String;

    /// Closed JSON Schema for the arguments, usually `input_schema::<Args>()`
    fn input_schema(&self) -> Value;

    /// Run with arguments already validated against `input_schema()`.
    /// Only storage failures are returned as `Err`.
    async fn run(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutcome, StoreError>;
}

/// Decode validated arguments into a typed record
pub(crate) fn decode_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolOutcome> {
    serde_json::from_value(args).map_err(|e| {
        ToolOutcome::failure(
            ToolFailureKind::InvalidArguments,
            format!("Invalid arguments: {e}"),
        )
    })
}

/// Static catalog of every tool name the model may return
pub struct ToolRegistry {
    server: Vec<Arc<dyn Tool>>,
    client: Vec<ToolDefinition>,
    server_names: BTreeSet<String>,
    client_names: BTreeSet<String>,
}

impl ToolRegistry {
    /// The ballot assistant's full tool set
    pub fn standard() -> Self {
        let server: Vec<Arc<dyn Tool>> = vec![
            Arc::new(NomineeInfoTool),
            Arc::new(CeremonyStatusTool),
            Arc::new(LeaderboardTool),
            Arc::new(SearchUsersTool),
            Arc::new(UserScoreTool),
            Arc::new(WinnersTool),
        ];
        Self::new(server, client::definitions())
    }

    fn new(server: Vec<Arc<dyn Tool>>, client: Vec<ToolDefinition>) -> Self {
        let server_names = server.iter().map(|t| t.name().to_string()).collect();
        let client_names = client.iter().map(|d| d.name.clone()).collect();
        Self {
            server,
            client,
            server_names,
            client_names,
        }
    }

    /// All definitions, server tools first, for advertising to the model
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.server
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description(),
                input_schema: t.input_schema(),
            })
            .chain(self.client.iter().cloned())
            .collect()
    }

    pub fn server_names(&self) -> &BTreeSet<String> {
        &self.server_names
    }

    pub fn client_names(&self) -> &BTreeSet<String> {
        &self.client_names
    }

    /// Execute a server tool by name. Unknown names and argument mismatches
    /// come back as in-band failures.
    pub async fn execute(
        &self,
        name: &str,
        args: Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutcome, StoreError> {
        let Some(tool) = self.server.iter().find(|t| t.name() == name) else {
            tracing::warn!(tool = %name, "Unknown server tool requested");
            return Ok(ToolOutcome::failure(
                ToolFailureKind::UnknownTool,
                format!("Unknown tool: {name}"),
            ));
        };

        if let Err(e) = schema::validate(&tool.input_schema(), &args) {
            tracing::debug!(tool = %name, error = %e, "Rejected tool arguments");
            return Ok(ToolOutcome::failure(
                ToolFailureKind::InvalidArguments,
                format!("Invalid arguments for {name}: {e}"),
            ));
        }

        let outcome = tool.run(args, ctx).await?;
        if let ToolOutcome::Failure(f) = &outcome {
            tracing::debug!(tool = %name, kind = ?f.kind, message = %f.message, "Tool returned failure");
        }
        Ok(outcome)
    }
}
