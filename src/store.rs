//! Read-only view of durable state used by server tools
//!
//! The turn controller and its tools only ever read. Writes (saving picks,
//! announcing winners) go through `Database` directly from the API layer.

use crate::db::{Ballot, CeremonyConfig, Database, DbError, UserProfile, Winners};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Storage read failed: {0}")]
pub struct StoreError(pub String);

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        Self(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Keyed reads and scans over profiles, ballots, and config records
#[async_trait]
pub trait BallotStore: Send + Sync {
    /// Ceremony lock/start record (defaults when absent)
    async fn ceremony_config(&self) -> StoreResult<CeremonyConfig>;

    /// Winners record (empty when absent)
    async fn winners(&self) -> StoreResult<Winners>;

    /// Full scan of all ballots, in stable scan order
    async fn ballots(&self) -> StoreResult<Vec<Ballot>>;

    /// A single user's ballot
    async fn ballot(&self, uid: &str) -> StoreResult<Option<Ballot>>;

    /// A single user's profile
    async fn user(&self, uid: &str) -> StoreResult<Option<UserProfile>>;

    /// Prefix-range query on display name
    async fn users_with_name_prefix(
        &self,
        prefix: &str,
        limit: usize,
    ) -> StoreResult<Vec<UserProfile>>;
}

#[async_trait]
impl<T: BallotStore + ?Sized> BallotStore for Arc<T> {
    async fn ceremony_config(&self) -> StoreResult<CeremonyConfig> {
        (**self).ceremony_config().await
    }

    async fn winners(&self) -> StoreResult<Winners> {
        (**self).winners().await
    }

    async fn ballots(&self) -> StoreResult<Vec<Ballot>> {
        (**self).ballots().await
    }

    async fn ballot(&self, uid: &str) -> StoreResult<Option<Ballot>> {
        (**self).ballot(uid).await
    }

    async fn user(&self, uid: &str) -> StoreResult<Option<UserProfile>> {
        (**self).user(uid).await
    }

    async fn users_with_name_prefix(
        &self,
        prefix: &str,
        limit: usize,
    ) -> StoreResult<Vec<UserProfile>> {
        (**self).users_with_name_prefix(prefix, limit).await
    }
}

/// Adapter to use `Database` as a `BallotStore`
#[derive(Clone)]
pub struct DatabaseStore {
    db: Database,
}

impl DatabaseStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BallotStore for DatabaseStore {
    async fn ceremony_config(&self) -> StoreResult<CeremonyConfig> {
        Ok(self.db.get_ceremony_config()?)
    }

    async fn winners(&self) -> StoreResult<Winners> {
        Ok(self.db.get_winners()?)
    }

    async fn ballots(&self) -> StoreResult<Vec<Ballot>> {
        Ok(self.db.list_ballots()?)
    }

    async fn ballot(&self, uid: &str) -> StoreResult<Option<Ballot>> {
        Ok(self.db.get_ballot(uid)?)
    }

    async fn user(&self, uid: &str) -> StoreResult<Option<UserProfile>> {
        Ok(self.db.get_user(uid)?)
    }

    async fn users_with_name_prefix(
        &self,
        prefix: &str,
        limit: usize,
    ) -> StoreResult<Vec<UserProfile>> {
        Ok(self.db.search_users_by_prefix(prefix, limit)?)
    }
}
