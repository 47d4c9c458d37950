//! Process configuration from the environment

use crate::catalog::{Catalog, CatalogError};
use crate::db::NewUser;
use crate::llm::LlmConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_TURN_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("Failed to read seed file {path}: {source}")]
    SeedRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed seed file {path}: {source}")]
    SeedParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub db_path: PathBuf,
    /// Catalog override; the embedded snapshot is used when unset
    pub catalog_path: Option<PathBuf>,
    pub seed_file: Option<PathBuf>,
    /// Wall-clock bound for one chat invocation
    pub turn_timeout: Duration,
    pub llm: LlmConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        let db_path = var("BALLOT_DB_PATH").map_or_else(
            || {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(format!("{home}/.ballot-assistant/ballot.db"))
            },
            PathBuf::from,
        );
        let port = var("BALLOT_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let turn_timeout = Duration::from_secs(
            var("BALLOT_TURN_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .filter(|&s| s > 0)
                .unwrap_or(DEFAULT_TURN_TIMEOUT_SECS),
        );

        Self {
            port,
            db_path,
            catalog_path: var("BALLOT_CATALOG_PATH").map(PathBuf::from),
            seed_file: var("BALLOT_SEED_FILE").map(PathBuf::from),
            turn_timeout,
            llm: LlmConfig::from_env().with_timeout(turn_timeout),
        }
    }

    pub fn load_catalog(&self) -> Result<Catalog, ConfigError> {
        match &self.catalog_path {
            Some(path) => Ok(Catalog::from_path(path)?),
            None => Ok(Catalog::embedded()?.clone()),
        }
    }

    /// Users to provision at startup; empty when no seed file is configured
    pub fn load_seed_users(&self) -> Result<Vec<NewUser>, ConfigError> {
        let Some(path) = &self.seed_file else {
            return Ok(Vec::new());
        };
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::SeedRead {
            path: path.clone(),
            source,
        })?;
        parse_seed(&json).map_err(|source| ConfigError::SeedParse {
            path: path.clone(),
            source,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    users: Vec<NewUser>,
}

fn parse_seed(json: &str) -> Result<Vec<NewUser>, serde_json::Error> {
    serde_json::from_str::<SeedFile>(json).map(|s| s.users)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config() -> AppConfig {
        AppConfig {
            port: DEFAULT_PORT,
            db_path: PathBuf::from("/tmp/unused.db"),
            catalog_path: None,
            seed_file: None,
            turn_timeout: Duration::from_secs(DEFAULT_TURN_TIMEOUT_SECS),
            llm: LlmConfig::default(),
        }
    }

    #[test]
    fn test_parse_seed_users() {
        let users = parse_seed(
            r#"{"users": [
                {"uid": "u1", "displayName": "Alice", "token": "t1", "isAdmin": true},
                {"uid": "u2", "displayName": "Bob", "email": "bob@example.com", "token": "t2"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(users.len(), 2);
        assert!(users[0].is_admin);
        assert!(!users[1].is_admin);
        assert_eq!(users[1].email.as_deref(), Some("bob@example.com"));
    }

    #[test]
    fn test_seed_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"users": [{{"uid": "u1", "displayName": "Alice", "token": "t"}}]}}"#).unwrap();

        let seeded = AppConfig {
            seed_file: Some(file.path().to_path_buf()),
            ..config()
        };
        assert_eq!(seeded.load_seed_users().unwrap().len(), 1);
        assert!(config().load_seed_users().unwrap().is_empty());
    }

    #[test]
    fn test_embedded_catalog_loads() {
        let catalog = config().load_catalog().unwrap();
        assert_eq!(catalog.total_categories(), 10);
        assert!(catalog.category("best-picture").is_some());
    }
}
