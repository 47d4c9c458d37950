//! Pure classification of one completion round

use crate::llm::{FunctionCall, LlmResponse};
use std::collections::BTreeSet;

/// What the controller does with a completion response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundPlan {
    /// No function calls: the concatenated message text ends the turn
    Complete { text: String },
    /// Only server calls: run them and call the model again
    Continue { server_calls: Vec<FunctionCall> },
    /// At least one client call: run the server calls, then suspend
    Suspend {
        server_calls: Vec<FunctionCall>,
        client_calls: Vec<FunctionCall>,
    },
}

/// Partition a response by registry membership. Returns the offending name
/// when a call belongs to neither partition.
pub fn classify(
    response: &LlmResponse,
    server_names: &BTreeSet<String>,
    client_names: &BTreeSet<String>,
) -> Result<RoundPlan, String> {
    let calls = response.function_calls();
    if calls.is_empty() {
        return Ok(RoundPlan::Complete {
            text: response.text(),
        });
    }

    let mut server_calls = Vec::new();
    let mut client_calls = Vec::new();
    for call in calls {
        if server_names.contains(&call.name) {
            server_calls.push(call.clone());
        } else if client_names.contains(&call.name) {
            client_calls.push(call.clone());
        } else {
            return Err(call.name.clone());
        }
    }

    if client_calls.is_empty() {
        Ok(RoundPlan::Continue { server_calls })
    } else {
        Ok(RoundPlan::Suspend {
            server_calls,
            client_calls,
        })
    }
}
