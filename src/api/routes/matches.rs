use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::{bearer_user_id, ApiError};
use crate::models::{Match, MatchId, Side, TeamRegistration, UserId};
use crate::service::{CreateMatchRequest, MatchDetail, MatchPatch};

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub message: String,
    pub added_count: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub side: Option<Side>,
}

#[derive(Debug, Deserialize)]
pub struct LeagueRegisterRequest {
    pub player_ids: Vec<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct AddPlayerRequest {
    pub player_id: UserId,
    pub side: Side,
}

#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    pub side: Side,
}

pub async fn list_matches(State(state): State<AppState>) -> Result<Json<Vec<Match>>, ApiError> {
    let matches = state.service.find_all().await?;
    Ok(Json(matches))
}

pub async fn get_match(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MatchDetail>, ApiError> {
    let detail = state.service.find_one(&MatchId::from(id)).await?;
    Ok(Json(detail))
}

pub async fn create_match(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateMatchRequest>,
) -> Result<(StatusCode, Json<Match>), ApiError> {
    let user_id = bearer_user_id(&headers)?;
    let created = state.service.create(&user_id, req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_match(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(patch): Json<MatchPatch>,
) -> Result<Json<Match>, ApiError> {
    let user_id = bearer_user_id(&headers)?;
    let updated = state
        .service
        .update(&user_id, &MatchId::from(id), patch)
        .await?;
    Ok(Json(updated))
}

pub async fn delete_match(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let user_id = bearer_user_id(&headers)?;
    state.service.remove(&user_id, &MatchId::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn register(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Option<Json<RegisterRequest>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user_id = bearer_user_id(&headers)?;
    let side = body.and_then(|Json(req)| req.side);
    let message = state
        .service
        .register(&user_id, &MatchId::from(id), side)
        .await?;
    Ok(Json(MessageResponse { message }))
}

pub async fn cancel_registration(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, ApiError> {
    let user_id = bearer_user_id(&headers)?;
    let message = state
        .service
        .cancel_registration(&user_id, &MatchId::from(id))
        .await?;
    Ok(Json(MessageResponse { message }))
}

pub async fn league_register(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<LeagueRegisterRequest>,
) -> Result<Json<TeamRegistration>, ApiError> {
    let user_id = bearer_user_id(&headers)?;
    let entry = state
        .service
        .league_register(&user_id, &MatchId::from(id), req.player_ids)
        .await?;
    Ok(Json(entry))
}

pub async fn auto_league_register(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, ApiError> {
    let user_id = bearer_user_id(&headers)?;
    let message = state
        .service
        .auto_league_register(&user_id, &MatchId::from(id))
        .await?;
    Ok(Json(MessageResponse { message }))
}

pub async fn my_registration(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Option<TeamRegistration>>, ApiError> {
    let user_id = bearer_user_id(&headers)?;
    let entry = state
        .service
        .my_league_registration(&user_id, &MatchId::from(id))
        .await?;
    Ok(Json(entry))
}

pub async fn distribute_teams(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, ApiError> {
    let user_id = bearer_user_id(&headers)?;
    let message = state
        .service
        .distribute_teams(&user_id, &MatchId::from(id))
        .await?;
    Ok(Json(MessageResponse { message }))
}

pub async fn add_player(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<AddPlayerRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user_id = bearer_user_id(&headers)?;
    let message = state
        .service
        .add_player(&user_id, &MatchId::from(id), &req.player_id, req.side)
        .await?;
    Ok(Json(MessageResponse { message }))
}

pub async fn sync_team_players(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, ApiError> {
    let user_id = bearer_user_id(&headers)?;
    let (message, added_count) = state
        .service
        .sync_team_players(&user_id, &MatchId::from(id), req.side)
        .await?;
    Ok(Json(SyncResponse {
        message,
        added_count,
    }))
}
