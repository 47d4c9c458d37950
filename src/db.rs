//! Database module
//!
//! Provides persistence for user profiles, ballots, and the ceremony
//! config records.

mod schema;

pub use schema::*;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Corrupt record {key}: {source}")]
    CorruptRecord {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Database lock poisoned")]
    LockPoisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Hash a bearer token for storage and lookup
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        // Other handles on the same file wait for the write lock
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    fn run_migrations(&self) -> DbResult<()> {
        self.conn()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== User Operations ====================

    /// Create or replace a user and its bearer token
    pub fn upsert_user(&self, user: &NewUser) -> DbResult<UserProfile> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (uid, display_name, email, is_admin, token_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(uid) DO UPDATE SET
                display_name = excluded.display_name,
                email = excluded.email,
                is_admin = excluded.is_admin,
                token_hash = excluded.token_hash",
            params![
                user.uid,
                user.display_name,
                user.email,
                user.is_admin,
                hash_token(&user.token),
                Utc::now().to_rfc3339()
            ],
        )?;

        Ok(UserProfile {
            uid: user.uid.clone(),
            display_name: user.display_name.clone(),
            email: user.email.clone(),
            is_admin: user.is_admin,
        })
    }

    /// Get a user profile by uid
    pub fn get_user(&self, uid: &str) -> DbResult<Option<UserProfile>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT uid, display_name, email, is_admin FROM users WHERE uid = ?1",
            params![uid],
            row_to_user,
        )
        .optional()
        .map_err(DbError::from)
    }

    /// Resolve a bearer token to its user
    pub fn get_user_by_token(&self, token: &str) -> DbResult<Option<UserProfile>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT uid, display_name, email, is_admin FROM users WHERE token_hash = ?1",
            params![hash_token(token)],
            row_to_user,
        )
        .optional()
        .map_err(DbError::from)
    }

    /// Prefix-range query on display name (case-sensitive, ordered by name)
    pub fn search_users_by_prefix(&self, prefix: &str, limit: usize) -> DbResult<Vec<UserProfile>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT uid, display_name, email, is_admin FROM users
             WHERE display_name >= ?1 AND display_name < ?2
             ORDER BY display_name
             LIMIT ?3",
        )?;
        let upper = format!("{prefix}\u{f8ff}");
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![prefix, upper, limit], row_to_user)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    // ==================== Ballot Operations ====================

    /// Get a user's ballot
    pub fn get_ballot(&self, uid: &str) -> DbResult<Option<Ballot>> {
        read_ballot(&*self.conn()?, uid)
    }

    /// Scan all ballots in insertion order
    pub fn list_ballots(&self) -> DbResult<Vec<Ballot>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT uid, picks, updated_at FROM ballots ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut ballots = Vec::new();
        for row in rows {
            let (uid, picks, updated_at) = row?;
            ballots.push(row_to_ballot(uid, &picks, &updated_at)?);
        }
        Ok(ballots)
    }

    /// Record a pick for one category, creating the ballot if needed.
    /// The read-modify-write runs in one immediate transaction.
    pub fn save_pick(&self, uid: &str, category_id: &str, nominee_id: &str) -> DbResult<Ballot> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut ballot = read_ballot(&tx, uid)?.unwrap_or_else(|| Ballot {
            uid: uid.to_string(),
            picks: Picks::new(),
            updated_at: None,
        });
        ballot
            .picks
            .insert(category_id.to_string(), nominee_id.to_string());
        let now = Utc::now();
        ballot.updated_at = Some(now);

        let picks_json = to_json(uid, &ballot.picks)?;
        tx.execute(
            "INSERT INTO ballots (uid, picks, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(uid) DO UPDATE SET picks = excluded.picks, updated_at = excluded.updated_at",
            params![uid, picks_json, now.to_rfc3339()],
        )?;
        tx.commit()?;

        Ok(ballot)
    }

    // ==================== Config Operations ====================

    /// Ceremony lock/start state (defaults when the record is absent)
    pub fn get_ceremony_config(&self) -> DbResult<CeremonyConfig> {
        Ok(read_config(&*self.conn()?, CEREMONY_KEY)?.unwrap_or_default())
    }

    /// Merge an update into the ceremony record
    pub fn update_ceremony_config(&self, update: &CeremonyUpdate) -> DbResult<CeremonyConfig> {
        self.modify_config(CEREMONY_KEY, |config: &mut CeremonyConfig| {
            if let Some(is_locked) = update.is_locked {
                config.is_locked = is_locked;
            }
            if let Some(started) = update.ceremony_started {
                config.ceremony_started = started;
            }
            if let Some(lock_time) = update.lock_time {
                config.lock_time = Some(lock_time);
            }
        })
    }

    /// Announced winners (empty when the record is absent)
    pub fn get_winners(&self) -> DbResult<Winners> {
        Ok(read_config(&*self.conn()?, WINNERS_KEY)?.unwrap_or_default())
    }

    /// Set (`Some`) or clear (`None`) the winner of a category
    pub fn set_winner(&self, category_id: &str, nominee_id: Option<&str>) -> DbResult<Winners> {
        self.modify_config(WINNERS_KEY, |winners: &mut Winners| match nominee_id {
            Some(id) => {
                winners.insert(category_id.to_string(), id.to_string());
            }
            None => {
                winners.remove(category_id);
            }
        })
    }

    /// Read, change, and write back one config record under a single
    /// immediate transaction
    fn modify_config<T, F>(&self, key: &str, change: F) -> DbResult<T>
    where
        T: DeserializeOwned + Serialize + Default,
        F: FnOnce(&mut T),
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut value: T = read_config(&tx, key)?.unwrap_or_default();
        change(&mut value);
        let json = to_json(key, &value)?;
        tx.execute(
            "INSERT INTO config (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, json, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        Ok(value)
    }
}

fn read_ballot(conn: &Connection, uid: &str) -> DbResult<Option<Ballot>> {
    let row = conn
        .query_row(
            "SELECT uid, picks, updated_at FROM ballots WHERE uid = ?1",
            params![uid],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;

    row.map(|(uid, picks, updated_at)| row_to_ballot(uid, &picks, &updated_at))
        .transpose()
}

fn read_config<T: DeserializeOwned>(conn: &Connection, key: &str) -> DbResult<Option<T>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM config WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;

    value
        .map(|v| {
            serde_json::from_str(&v).map_err(|source| DbError::CorruptRecord {
                key: key.to_string(),
                source,
            })
        })
        .transpose()
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserProfile> {
    Ok(UserProfile {
        uid: row.get(0)?,
        display_name: row.get(1)?,
        email: row.get(2)?,
        is_admin: row.get(3)?,
    })
}

fn row_to_ballot(uid: String, picks: &str, updated_at: &str) -> DbResult<Ballot> {
    let picks: Picks = serde_json::from_str(picks).map_err(|source| DbError::CorruptRecord {
        key: format!("ballots/{uid}"),
        source,
    })?;
    Ok(Ballot {
        uid,
        picks,
        updated_at: parse_datetime(updated_at),
    })
}

fn to_json<T: Serialize>(key: &str, value: &T) -> DbResult<String> {
    serde_json::to_string(value).map_err(|source| DbError::CorruptRecord {
        key: key.to_string(),
        source,
    })
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
