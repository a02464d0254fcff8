//! REST API endpoints.
//!
//! Axum-based HTTP API for the match lifecycle and roster operations.
//! Caller identity arrives pre-resolved: the bearer token is the user id
//! issued by the identity collaborator.

pub mod routes;
pub mod state;

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::models::UserId;
use crate::roster::LedgerError;
use state::AppState;

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Resource busy, retry shortly")]
    Busy,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NotFound(msg) => ApiError::NotFound(msg),
            LedgerError::InvalidState(msg) => ApiError::InvalidState(msg),
            LedgerError::Forbidden(msg) => ApiError::Forbidden(msg),
            LedgerError::Conflict(msg) => ApiError::Conflict(msg),
            LedgerError::Busy => ApiError::Busy,
            LedgerError::Storage(e) => ApiError::Internal(e.to_string()),
            LedgerError::Directory(e) => ApiError::Internal(e.to_string()),
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::InvalidState(_) => (StatusCode::BAD_REQUEST, "INVALID_STATE"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Busy => (StatusCode::SERVICE_UNAVAILABLE, "BUSY"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Resolve the caller from the Authorization header. The identity
/// collaborator has already exchanged credentials for a user id, which
/// travels as the bearer token.
pub fn bearer_user_id(headers: &HeaderMap) -> Result<UserId, ApiError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;

    let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();
    if token.is_empty() {
        return Err(ApiError::Unauthorized("empty bearer token".to_string()));
    }
    Ok(UserId::from(token))
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/api/health", get(routes::meta::health))
        .route(
            "/api/matches",
            get(routes::matches::list_matches).post(routes::matches::create_match),
        )
        .route(
            "/api/matches/:id",
            get(routes::matches::get_match)
                .put(routes::matches::update_match)
                .delete(routes::matches::delete_match),
        )
        .route("/api/matches/:id/register", post(routes::matches::register))
        .route(
            "/api/matches/:id/cancel-registration",
            post(routes::matches::cancel_registration),
        )
        .route(
            "/api/matches/:id/league-register",
            post(routes::matches::league_register),
        )
        .route(
            "/api/matches/:id/auto-league-register",
            post(routes::matches::auto_league_register),
        )
        .route(
            "/api/matches/:id/my-registration",
            get(routes::matches::my_registration),
        )
        .route(
            "/api/matches/:id/distribute",
            post(routes::matches::distribute_teams),
        )
        .route(
            "/api/matches/:id/add-player",
            post(routes::matches::add_player),
        )
        .route(
            "/api/matches/:id/sync-team-players",
            post(routes::matches::sync_team_players),
        )
        .route(
            "/api/registrations",
            get(routes::registrations::list_registrations),
        )
        .route(
            "/api/registrations/export",
            get(routes::registrations::export_registrations),
        )
        .route(
            "/api/registrations/:id/audit",
            put(routes::registrations::audit_registration),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
