//! Test doubles for the completion endpoint and durable storage

use crate::catalog::fixtures::test_catalog;
use crate::db::{Ballot, CeremonyConfig, Picks, UserProfile, Winners};
use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmService};
use crate::store::{BallotStore, StoreResult};
use crate::tools::ToolContext;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Completion endpoint that replays queued responses and records requests
pub struct MockLlmService {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmService {
    pub fn new(responses: Vec<Result<LlmResponse, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmService for MockLlmService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::unknown("No more mock responses")))
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }
}

/// In-memory durable state with per-operation access counters.
/// Ballots are scanned in insertion order.
#[derive(Default)]
pub struct InMemoryStore {
    ceremony: Option<CeremonyConfig>,
    winners: Winners,
    users: Vec<UserProfile>,
    ballots: Vec<Ballot>,
    ballot_scans: AtomicUsize,
    ballot_reads: AtomicUsize,
    user_reads: AtomicUsize,
}

impl InMemoryStore {
    pub fn with_ceremony(mut self, config: CeremonyConfig) -> Self {
        self.ceremony = Some(config);
        self
    }

    pub fn with_winner(mut self, category_id: &str, nominee_id: &str) -> Self {
        self.winners
            .insert(category_id.to_string(), nominee_id.to_string());
        self
    }

    pub fn with_user(mut self, uid: &str, display_name: &str) -> Self {
        self.users.push(UserProfile {
            uid: uid.to_string(),
            display_name: display_name.to_string(),
            email: Some(format!("{uid}@example.com")),
            is_admin: false,
        });
        self
    }

    pub fn with_ballot(mut self, uid: &str, picks: &[(&str, &str)]) -> Self {
        let picks: Picks = picks
            .iter()
            .map(|(c, n)| ((*c).to_string(), (*n).to_string()))
            .collect();
        self.ballots.push(Ballot {
            uid: uid.to_string(),
            picks,
            updated_at: None,
        });
        self
    }

    /// Full ballot scans performed
    pub fn ballot_scans(&self) -> usize {
        self.ballot_scans.load(Ordering::SeqCst)
    }

    /// Single-ballot reads performed
    pub fn ballot_reads(&self) -> usize {
        self.ballot_reads.load(Ordering::SeqCst)
    }

    /// Single-profile reads performed
    pub fn user_reads(&self) -> usize {
        self.user_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BallotStore for InMemoryStore {
    async fn ceremony_config(&self) -> StoreResult<CeremonyConfig> {
        Ok(self.ceremony.clone().unwrap_or_default())
    }

    async fn winners(&self) -> StoreResult<Winners> {
        Ok(self.winners.clone())
    }

    async fn ballots(&self) -> StoreResult<Vec<Ballot>> {
        self.ballot_scans.fetch_add(1, Ordering::SeqCst);
        Ok(self.ballots.clone())
    }

    async fn ballot(&self, uid: &str) -> StoreResult<Option<Ballot>> {
        self.ballot_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.ballots.iter().find(|b| b.uid == uid).cloned())
    }

    async fn user(&self, uid: &str) -> StoreResult<Option<UserProfile>> {
        self.user_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.users.iter().find(|u| u.uid == uid).cloned())
    }

    async fn users_with_name_prefix(
        &self,
        prefix: &str,
        limit: usize,
    ) -> StoreResult<Vec<UserProfile>> {
        let mut matches: Vec<UserProfile> = self
            .users
            .iter()
            .filter(|u| u.display_name.starts_with(prefix))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        matches.truncate(limit);
        Ok(matches)
    }
}

/// Tool context over the test catalog, acting as `u1`
pub fn tool_context(store: Arc<InMemoryStore>, ceremony_started: bool) -> ToolContext {
    ToolContext {
        store,
        catalog: Arc::new(test_catalog()),
        uid: "u1".to_string(),
        ceremony_started,
    }
}
