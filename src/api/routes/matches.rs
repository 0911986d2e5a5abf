use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::api::state::AppState;
use crate::api::{ActorRequest, ApiError};
use crate::models::{Match, MatchId, PlayerId};
use crate::platform::{CancelOutcome, NewMatch};

#[derive(Debug, Deserialize)]
pub struct RosterRequest {
    pub player_id: PlayerId,
}

#[derive(Debug, Deserialize)]
pub struct RemoveMemberRequest {
    pub actor_id: PlayerId,
    pub player_id: PlayerId,
}

pub async fn create_match(
    State(state): State<AppState>,
    Json(req): Json<NewMatch>,
) -> Result<(StatusCode, Json<Match>), ApiError> {
    let created = state
        .mutate(|platform| platform.create_match(req, Utc::now()))
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_match(
    State(state): State<AppState>,
    Path(id): Path<MatchId>,
) -> Result<Json<Match>, ApiError> {
    let platform = state.read().await;
    Ok(Json(platform.get_match(&id)?.clone()))
}

pub async fn join_match(
    State(state): State<AppState>,
    Path(id): Path<MatchId>,
    Json(req): Json<RosterRequest>,
) -> Result<Json<Match>, ApiError> {
    let updated = state
        .mutate(|platform| platform.join_match(&id, &req.player_id, Utc::now()))
        .await?;
    Ok(Json(updated))
}

pub async fn leave_match(
    State(state): State<AppState>,
    Path(id): Path<MatchId>,
    Json(req): Json<RosterRequest>,
) -> Result<Json<Match>, ApiError> {
    let updated = state
        .mutate(|platform| platform.leave_match(&id, &req.player_id, Utc::now()))
        .await?;
    Ok(Json(updated))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Path(id): Path<MatchId>,
    Json(req): Json<RemoveMemberRequest>,
) -> Result<Json<Match>, ApiError> {
    let updated = state
        .mutate(|platform| {
            platform.remove_member(&id, &req.actor_id, &req.player_id, Utc::now())
        })
        .await?;
    Ok(Json(updated))
}

pub async fn cancel_match(
    State(state): State<AppState>,
    Path(id): Path<MatchId>,
    Json(req): Json<ActorRequest>,
) -> Result<Json<CancelOutcome>, ApiError> {
    let outcome = state
        .mutate(|platform| platform.cancel_or_delete_match(&id, &req.actor_id, Utc::now()))
        .await?;
    Ok(Json(outcome))
}
