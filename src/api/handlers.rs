//! HTTP request handlers

use super::auth::{AdminUser, AuthUser};
use super::types::{
    BallotResponse, CatalogResponse, ChatRpcRequest, ErrorResponse, SavePickRequest,
    SavePickResponse, SetWinnerRequest, WinnersResponse,
};
use super::AppState;
use crate::db::{score_picks, CeremonyConfig, CeremonyUpdate, DbError};
use crate::llm::LlmErrorKind;
use crate::turn::{TurnError, TurnRequest, TurnResponse};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use std::time::Instant;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Conversational assistant
        .route("/api/chat", post(chat))
        // Ballot
        .route("/api/catalog", get(get_catalog))
        .route("/api/ballot", get(get_ballot))
        .route("/api/ballot/picks", post(save_pick))
        // Ceremony administration
        .route("/api/admin/winners", post(set_winner))
        .route("/api/admin/ceremony", post(update_ceremony))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Chat
// ============================================================

async fn chat(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<ChatRpcRequest>, JsonRejection>,
) -> Result<Json<TurnResponse>, ApiError> {
    let Json(payload) = payload?;
    let request = TurnRequest::try_from(payload)
        .map_err(|msg| ApiError::InvalidArgument(msg.to_string()))?;
    let turns = state.turns.as_ref().ok_or_else(|| {
        ApiError::Unavailable("The assistant is not configured on this server.".to_string())
    })?;

    let resuming = matches!(request, TurnRequest::Resume { .. });
    let started = Instant::now();
    let response = tokio::time::timeout(state.turn_timeout, turns.run(request, &user.uid))
        .await
        .map_err(|_| {
            tracing::warn!(
                uid = %user.uid,
                timeout_secs = state.turn_timeout.as_secs(),
                "Chat turn timed out"
            );
            ApiError::DeadlineExceeded("The assistant took too long to respond.".to_string())
        })??;

    tracing::info!(
        uid = %user.uid,
        resuming,
        pending = matches!(response, TurnResponse::ToolCallPending { .. }),
        duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "Chat turn finished"
    );
    Ok(Json(response))
}

// ============================================================
// Ballot
// ============================================================

async fn get_catalog(State(state): State<AppState>, _user: AuthUser) -> Json<CatalogResponse> {
    Json(CatalogResponse {
        ceremony: state.catalog.ceremony().map(str::to_string),
        categories: state.catalog.categories().to_vec(),
    })
}

async fn get_ballot(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<BallotResponse>, ApiError> {
    let picks = state
        .db
        .get_ballot(&user.uid)?
        .map(|b| b.picks)
        .unwrap_or_default();
    let winners = state.db.get_winners()?;
    let ceremony = state.db.get_ceremony_config()?;

    Ok(Json(BallotResponse {
        uid: user.uid,
        display_name: user.display_name,
        picks_count: count(picks.len()),
        total_categories: count(state.catalog.total_categories()),
        score: count(score_picks(&picks, &winners)),
        winners_count: count(winners.len()),
        is_locked: ceremony.is_locked_at(Utc::now()),
        ceremony_started: ceremony.ceremony_started,
        lock_time: ceremony.lock_time,
        picks,
    }))
}

async fn save_pick(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<SavePickRequest>, JsonRejection>,
) -> Result<Json<SavePickResponse>, ApiError> {
    let Json(req) = payload?;
    let category = state.catalog.category(&req.category_id).ok_or_else(|| {
        ApiError::NotFound(format!("Category '{}' not found.", req.category_id))
    })?;
    if category.nominee(&req.nominee_id).is_none() {
        return Err(ApiError::InvalidArgument(format!(
            "Nominee '{}' is not in {}.",
            req.nominee_id, category.name
        )));
    }

    if state.db.get_ceremony_config()?.is_locked_at(Utc::now()) {
        return Err(ApiError::FailedPrecondition(
            "Ballots are locked.".to_string(),
        ));
    }

    let ballot = state
        .db
        .save_pick(&user.uid, &req.category_id, &req.nominee_id)?;
    tracing::info!(
        uid = %user.uid,
        category = %req.category_id,
        nominee = %req.nominee_id,
        "Pick saved"
    );

    Ok(Json(SavePickResponse {
        picks_count: count(ballot.picks.len()),
        picks: ballot.picks,
    }))
}

// ============================================================
// Admin
// ============================================================

async fn set_winner(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    payload: Result<Json<SetWinnerRequest>, JsonRejection>,
) -> Result<Json<WinnersResponse>, ApiError> {
    let Json(req) = payload?;
    let category = state.catalog.category(&req.category_id).ok_or_else(|| {
        ApiError::NotFound(format!("Category '{}' not found.", req.category_id))
    })?;
    if let Some(nominee_id) = &req.nominee_id {
        if category.nominee(nominee_id).is_none() {
            return Err(ApiError::InvalidArgument(format!(
                "Nominee '{nominee_id}' is not in {}.",
                category.name
            )));
        }
    }

    let winners = state
        .db
        .set_winner(&req.category_id, req.nominee_id.as_deref())?;
    tracing::info!(
        admin = %admin.uid,
        category = %req.category_id,
        nominee = ?req.nominee_id,
        "Winner updated"
    );
    Ok(Json(WinnersResponse { winners }))
}

async fn update_ceremony(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    payload: Result<Json<CeremonyUpdate>, JsonRejection>,
) -> Result<Json<CeremonyConfig>, ApiError> {
    let Json(update) = payload?;
    let config = state.db.update_ceremony_config(&update)?;
    tracing::info!(
        admin = %admin.uid,
        is_locked = config.is_locked,
        ceremony_started = config.ceremony_started,
        "Ceremony config updated"
    );
    Ok(Json(config))
}

async fn get_version() -> &'static str {
    concat!("ballot-assistant ", env!("CARGO_PKG_VERSION"))
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
pub enum ApiError {
    Unauthenticated(String),
    PermissionDenied(String),
    InvalidArgument(String),
    NotFound(String),
    FailedPrecondition(String),
    Unavailable(String),
    DeadlineExceeded(String),
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::PermissionDenied(_) => "permission-denied",
            ApiError::InvalidArgument(_) => "invalid-argument",
            ApiError::NotFound(_) => "not-found",
            ApiError::FailedPrecondition(_) => "failed-precondition",
            ApiError::Unavailable(_) => "unavailable",
            ApiError::DeadlineExceeded(_) => "deadline-exceeded",
            ApiError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::FailedPrecondition(_) => StatusCode::CONFLICT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = match self {
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                "Internal error.".to_string()
            }
            ApiError::Unauthenticated(msg)
            | ApiError::PermissionDenied(msg)
            | ApiError::InvalidArgument(msg)
            | ApiError::NotFound(msg)
            | ApiError::FailedPrecondition(msg)
            | ApiError::Unavailable(msg)
            | ApiError::DeadlineExceeded(msg) => msg,
        };

        let body = Json(ErrorResponse::new(message, code));
        (status, body).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidArgument(rejection.body_text())
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<TurnError> for ApiError {
    fn from(e: TurnError) -> Self {
        match e {
            TurnError::InvalidState(e) => ApiError::InvalidArgument(e.to_string()),
            TurnError::Llm(e) => {
                tracing::warn!(kind = %e.kind, error = %e.message, "Completion request failed");
                match e.kind {
                    LlmErrorKind::Timeout => ApiError::DeadlineExceeded(e.message),
                    LlmErrorKind::Network
                    | LlmErrorKind::RateLimit
                    | LlmErrorKind::ServerError
                    | LlmErrorKind::Unavailable => ApiError::Unavailable(e.message),
                    LlmErrorKind::Auth
                    | LlmErrorKind::InvalidRequest
                    | LlmErrorKind::MalformedResponse
                    | LlmErrorKind::Unknown => ApiError::Internal(e.message),
                }
            }
            e @ (TurnError::ProtocolViolation(_) | TurnError::Storage(_)) => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}
