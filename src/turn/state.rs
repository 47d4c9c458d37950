//! Resumable conversation snapshot
//!
//! The snapshot is the only state carried across a suspension. Callers hold
//! it and send it back verbatim with the results of the pending client calls.

use crate::llm::TranscriptItem;
use crate::tools::ClientToolResult;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

/// Snapshot format this build produces and accepts
pub const STATE_VERSION: u32 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResumeError {
    #[error("Unsupported conversation state version {0} (expected {STATE_VERSION})")]
    UnsupportedVersion(u32),
    #[error("Conversation state has an output for unknown call '{0}'")]
    OrphanOutput(String),
    #[error("Conversation state repeats call id '{0}'")]
    DuplicateCall(String),
    #[error("Tool result for '{0}' does not match a pending call")]
    UnknownCall(String),
    #[error("Tool result for '{0}' supplied more than once")]
    DuplicateResult(String),
    #[error("Missing tool result for pending call '{0}'")]
    MissingResult(String),
    #[error("Pending call '{0}' is not a client tool call")]
    NotClientCall(String),
}

/// Versioned transcript snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub version: u32,
    pub items: Vec<TranscriptItem>,
}

impl ConversationState {
    pub fn new(items: Vec<TranscriptItem>) -> Self {
        Self {
            version: STATE_VERSION,
            items,
        }
    }

    /// Function calls without an output yet, in transcript order
    pub fn pending_call_ids(&self) -> Result<Vec<&str>, ResumeError> {
        Ok(self.pending_calls()?.into_iter().map(|(id, _)| id).collect())
    }

    /// `(call_id, name)` of every unanswered call
    fn pending_calls(&self) -> Result<Vec<(&str, &str)>, ResumeError> {
        let mut seen_calls = HashSet::new();
        let mut answered = HashSet::new();
        let mut pending = Vec::new();

        for item in &self.items {
            match item {
                TranscriptItem::FunctionCall { call_id, name, .. } => {
                    if !seen_calls.insert(call_id.as_str()) {
                        return Err(ResumeError::DuplicateCall(call_id.clone()));
                    }
                    pending.push((call_id.as_str(), name.as_str()));
                }
                TranscriptItem::FunctionCallOutput { call_id, .. } => {
                    if !seen_calls.contains(call_id.as_str()) || !answered.insert(call_id.as_str()) {
                        return Err(ResumeError::OrphanOutput(call_id.clone()));
                    }
                }
                TranscriptItem::Message { .. } => {}
            }
        }

        pending.retain(|(id, _)| !answered.contains(id));
        Ok(pending)
    }

    /// Append one output per result, in the order given, after checking that
    /// the results answer exactly the pending calls and that every pending
    /// call names a tool in `client_names`
    pub fn resume(
        self,
        results: &[ClientToolResult],
        client_names: &BTreeSet<String>,
    ) -> Result<Vec<TranscriptItem>, ResumeError> {
        if self.version != STATE_VERSION {
            return Err(ResumeError::UnsupportedVersion(self.version));
        }

        let mut pending = Vec::new();
        for (id, name) in self.pending_calls()? {
            if !client_names.contains(name) {
                return Err(ResumeError::NotClientCall(id.to_string()));
            }
            pending.push(id.to_string());
        }
        let mut supplied = HashSet::new();
        for result in results {
            let id = result.call_id.as_str();
            if !pending.iter().any(|p| p == id) {
                return Err(ResumeError::UnknownCall(result.call_id.clone()));
            }
            if !supplied.insert(id) {
                return Err(ResumeError::DuplicateResult(result.call_id.clone()));
            }
        }
        if let Some(missing) = pending.into_iter().find(|id| !supplied.contains(id.as_str())) {
            return Err(ResumeError::MissingResult(missing));
        }

        let mut items = self.items;
        items.extend(
            results
                .iter()
                .map(|r| TranscriptItem::function_call_output_value(&r.call_id, &r.output)),
        );
        Ok(items)
    }
}
