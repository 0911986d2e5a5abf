use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::api::state::AppState;
use crate::api::{ActorRequest, ApiError};
use crate::models::{Match, MatchId, PlayerId, Role};
use crate::platform::{AuditReport, ReconcileReport};

#[derive(Debug, Deserialize)]
pub struct AuditParams {
    pub actor_id: PlayerId,
}

/// Read-only drift report. Requires the admin role.
pub async fn audit(
    State(state): State<AppState>,
    Query(params): Query<AuditParams>,
) -> Result<Json<AuditReport>, ApiError> {
    let platform = state.read().await;
    platform.require_role(&params.actor_id, Role::Admin)?;
    Ok(Json(platform.audit_ledgers()))
}

pub async fn reconcile(
    State(state): State<AppState>,
    Json(req): Json<ActorRequest>,
) -> Result<Json<ReconcileReport>, ApiError> {
    let report = state
        .mutate(|platform| platform.reconcile_ledgers(&req.actor_id, Utc::now()))
        .await?;
    Ok(Json(report))
}

pub async fn force_cancel(
    State(state): State<AppState>,
    Path(id): Path<MatchId>,
    Json(req): Json<ActorRequest>,
) -> Result<Json<Match>, ApiError> {
    let cancelled = state
        .mutate(|platform| platform.force_cancel_match(&id, &req.actor_id, Utc::now()))
        .await?;
    Ok(Json(cancelled))
}

pub async fn force_delete(
    State(state): State<AppState>,
    Path(id): Path<MatchId>,
    Json(req): Json<ActorRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .mutate(|platform| platform.force_delete_match(&id, &req.actor_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
