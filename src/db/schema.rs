//! Database schema and record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS users (
    uid TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    email TEXT,
    is_admin BOOLEAN NOT NULL DEFAULT 0,
    token_hash TEXT UNIQUE,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_users_display_name ON users(display_name);

CREATE TABLE IF NOT EXISTS ballots (
    uid TEXT PRIMARY KEY,
    picks TEXT NOT NULL DEFAULT '{}',
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS config (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

/// Key of the singleton ceremony record in the config table
pub const CEREMONY_KEY: &str = "ceremony";

/// Key of the singleton winners record in the config table
pub const WINNERS_KEY: &str = "winners";

/// Per-user profile record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub display_name: String,
    pub email: Option<String>,
    pub is_admin: bool,
}

/// Category id -> nominee id
pub type Picks = BTreeMap<String, String>;

/// Category id -> winning nominee id
pub type Winners = BTreeMap<String, String>;

/// Per-user ballot record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ballot {
    pub uid: String,
    pub picks: Picks,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Ballot {
    /// Number of categories where the pick equals the announced winner
    pub fn score(&self, winners: &Winners) -> usize {
        score_picks(&self.picks, winners)
    }
}

/// Number of categories where the pick equals the announced winner
pub fn score_picks(picks: &Picks, winners: &Winners) -> usize {
    winners
        .iter()
        .filter(|(category_id, winner)| picks.get(*category_id) == Some(*winner))
        .count()
}

/// Ceremony lock/start state. Absent record means unlocked and not started.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CeremonyConfig {
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub ceremony_started: bool,
    #[serde(default)]
    pub lock_time: Option<DateTime<Utc>>,
}

impl CeremonyConfig {
    /// Ballots are locked by the explicit flag or once the lock time passes
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.is_locked || self.lock_time.is_some_and(|t| now >= t)
    }
}

/// Merge-update for the ceremony record; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CeremonyUpdate {
    pub is_locked: Option<bool>,
    pub ceremony_started: Option<bool>,
    pub lock_time: Option<DateTime<Utc>>,
}

/// User provisioning record (seed file entry)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub uid: String,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub token: String,
    #[serde(default)]
    pub is_admin: bool,
}
