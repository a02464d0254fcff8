//! Admin surfaces over league team registrations.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use crate::api::state::AppState;
use crate::api::{bearer_user_id, ApiError};
use crate::models::{TeamEntryId, TeamEntryStatus, TeamRegistration};
use crate::service::ExportRow;

#[derive(Debug, Deserialize)]
pub struct AuditRequest {
    pub status: TeamEntryStatus,
    pub feedback: Option<String>,
}

pub async fn list_registrations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<TeamRegistration>>, ApiError> {
    let user_id = bearer_user_id(&headers)?;
    let entries = state.service.all_registrations(&user_id).await?;
    Ok(Json(entries))
}

pub async fn audit_registration(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<AuditRequest>,
) -> Result<Json<TeamRegistration>, ApiError> {
    let user_id = bearer_user_id(&headers)?;
    let entry = state
        .service
        .audit_registration(&user_id, &TeamEntryId::from(id), req.status, req.feedback)
        .await?;
    Ok(Json(entry))
}

pub async fn export_registrations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ExportRow>>, ApiError> {
    let user_id = bearer_user_id(&headers)?;
    let rows = state.service.export_registrations(&user_id).await?;
    Ok(Json(rows))
}
