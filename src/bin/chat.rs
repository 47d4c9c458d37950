//! Terminal chat client for the ballot assistant
//!
//! Sends each line typed as a fresh turn, runs the client tools the
//! assistant asks for (saving picks through the ballot endpoint, tracking
//! navigation locally) and resumes until the assistant answers in text.
//!
//! Usage: `BALLOT_TOKEN=... ballot-chat` (server at `BALLOT_URL`, default
//! `http://localhost:8000`).

use ballot_assistant::api::{
    BallotResponse, CatalogResponse, ChatRpcRequest, ErrorResponse, SavePickRequest,
    SavePickResponse,
};
use ballot_assistant::catalog::{Catalog, CatalogError};
use ballot_assistant::tools::{execute_client_tools, ClientEnvironment, ClientToolResult};
use ballot_assistant::turn::{HistoryMessage, HistoryRole, TurnResponse};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{BufRead, Write};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_URL: &str = "http://localhost:8000";
const MAX_RESUMPTIONS: usize = 5;

#[derive(Debug, Error)]
enum ClientError {
    #[error("{code}: {message}")]
    Rpc { code: String, message: String },
    #[error("HTTP {0}")]
    Status(u16),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl From<ureq::Error> for ClientError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Status(status, response) => match response.into_json::<ErrorResponse>() {
                Ok(body) => ClientError::Rpc {
                    code: body.code,
                    message: body.error,
                },
                Err(_) => ClientError::Status(status),
            },
            ureq::Error::Transport(t) => ClientError::Transport(t.to_string()),
        }
    }
}

struct BallotClient {
    agent: ureq::Agent,
    base_url: String,
    auth: String,
    current_path: String,
}

impl BallotClient {
    fn new(base_url: &str, token: &str) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(180))
                .build(),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth: format!("Bearer {token}"),
            current_path: "/".to_string(),
        }
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self
            .agent
            .get(&format!("{}{path}", self.base_url))
            .set("Authorization", &self.auth)
            .call()?;
        Ok(response.into_json()?)
    }

    fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ClientError> {
        let response = self
            .agent
            .post(&format!("{}{path}", self.base_url))
            .set("Authorization", &self.auth)
            .send_json(body)?;
        Ok(response.into_json()?)
    }

    fn catalog(&self) -> Result<Catalog, ClientError> {
        let response: CatalogResponse = self.get("/api/catalog")?;
        Ok(Catalog::from_categories(response.ceremony, response.categories)?)
    }

    fn chat(&self, request: &ChatRpcRequest) -> Result<TurnResponse, ClientError> {
        self.post("/api/chat", request)
    }
}

impl ClientEnvironment for BallotClient {
    fn save_pick(&mut self, category_id: &str, nominee_id: &str) -> Result<(), String> {
        let request = SavePickRequest {
            category_id: category_id.to_string(),
            nominee_id: nominee_id.to_string(),
        };
        self.post::<_, SavePickResponse>("/api/ballot/picks", &request)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    fn navigate(&mut self, path: &str) {
        self.current_path = path.to_string();
    }
}

/// Run one user message to completion, returning the assistant's reply
fn run_turn(
    client: &mut BallotClient,
    catalog: &Catalog,
    history: &[HistoryMessage],
) -> Result<String, ClientError> {
    let ballot: BallotResponse = client.get("/api/ballot")?;
    let context = ballot.user_context(Some(client.current_path.clone()));
    let mut response = client.chat(&ChatRpcRequest::fresh(history.to_vec(), context))?;

    let mut resumptions = 0;
    loop {
        let (tool_calls, state) = match response {
            TurnResponse::Complete { message } => return Ok(message),
            TurnResponse::ToolCallPending {
                tool_calls,
                conversation_state,
            } => (tool_calls, conversation_state),
        };
        if resumptions == MAX_RESUMPTIONS {
            return Ok("(The assistant kept requesting actions; stopping here.)".to_string());
        }
        resumptions += 1;

        let results = execute_client_tools(&tool_calls, client, catalog);
        for (call, result) in tool_calls.iter().zip(&results) {
            print_tool_result(&call.name, result);
        }
        response = client.chat(&ChatRpcRequest::resume(state, results))?;
    }
}

fn print_tool_result(name: &str, result: &ClientToolResult) {
    let text = result
        .output
        .get("message")
        .or_else(|| result.output.get("error"))
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    println!("  [{name}] {text}");
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let base_url = std::env::var("BALLOT_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let token = std::env::var("BALLOT_TOKEN").map_err(|_| "BALLOT_TOKEN must be set")?;

    let mut client = BallotClient::new(&base_url, &token);
    let catalog = client.catalog()?;
    println!(
        "Connected to {base_url} ({} categories). Type /quit to exit.",
        catalog.total_categories()
    );

    let mut history: Vec<HistoryMessage> = Vec::new();
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("{} > ", client.current_path);
        std::io::stdout().flush()?;

        let Some(line) = lines.next() else { break };
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }

        history.push(HistoryMessage {
            role: HistoryRole::User,
            content: line.to_string(),
        });
        match run_turn(&mut client, &catalog, &history) {
            Ok(reply) => {
                println!("{reply}");
                history.push(HistoryMessage {
                    role: HistoryRole::Assistant,
                    content: reply,
                });
            }
            Err(e) => {
                eprintln!("error: {e}");
                history.pop();
            }
        }
    }

    Ok(())
}
