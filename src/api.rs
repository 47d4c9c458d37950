//! HTTP API for the ballot assistant
//!
//! The chat RPC plus the ballot and admin endpoints its clients need.

mod auth;
mod handlers;
mod types;

pub use handlers::{create_router, ApiError};
pub use types::*;

use crate::catalog::Catalog;
use crate::db::Database;
use crate::llm::LlmService;
use crate::store::DatabaseStore;
use crate::tools::ToolRegistry;
use crate::turn::TurnController;
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub catalog: Arc<Catalog>,
    /// Absent when no completion endpoint is configured
    pub turns: Option<Arc<TurnController>>,
    pub turn_timeout: Duration,
}

impl AppState {
    pub fn new(
        db: Database,
        catalog: Arc<Catalog>,
        llm: Option<Arc<dyn LlmService>>,
        turn_timeout: Duration,
    ) -> Self {
        let turns = llm.map(|llm| {
            Arc::new(TurnController::new(
                llm,
                Arc::new(ToolRegistry::standard()),
                Arc::new(DatabaseStore::new(db.clone())),
                Arc::clone(&catalog),
            ))
        });
        Self {
            db,
            catalog,
            turns,
            turn_timeout,
        }
    }
}
