use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::ledger;
use crate::models::{CourtId, LedgerEntry, Player, PlayerId, Role};
use crate::platform::CoreError;

#[derive(Debug, Deserialize)]
pub struct RegisterPlayerRequest {
    pub name: String,
    #[serde(default)]
    pub roles: Vec<Role>,
}

#[derive(Debug, Serialize)]
pub struct PlayerSummary {
    pub id: PlayerId,
    pub name: String,
    pub current_rating: f64,
    pub primary_role: Role,
    pub roles: Vec<Role>,
    pub managed_courts: Vec<CourtId>,
    /// Matches with a confirmed result
    pub matches_rated: usize,
}

impl From<&Player> for PlayerSummary {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id.clone(),
            name: player.name.clone(),
            current_rating: player.current_rating,
            primary_role: player.primary_role(),
            roles: player.roles.clone(),
            managed_courts: player.managed_courts.clone(),
            matches_rated: player.ledger.iter().filter(|e| !e.is_placeholder()).count(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LedgerResponse {
    pub player_id: PlayerId,
    pub current_rating: f64,
    /// `DEFAULT_RATING + Σ delta`; equals `current_rating` unless the ledger drifted
    pub ledger_rating: f64,
    pub entries: Vec<LedgerEntry>,
}

pub async fn register_player(
    State(state): State<AppState>,
    Json(req): Json<RegisterPlayerRequest>,
) -> Result<(StatusCode, Json<PlayerSummary>), ApiError> {
    let name = req.name.trim().to_string();
    let player = state
        .mutate(move |platform| {
            if name.is_empty() {
                return Err(CoreError::InvalidRequest("name must not be empty".to_string()));
            }
            Ok(platform.register_player(name, req.roles))
        })
        .await?;
    Ok((StatusCode::CREATED, Json(PlayerSummary::from(&player))))
}

pub async fn get_player(
    State(state): State<AppState>,
    Path(id): Path<PlayerId>,
) -> Result<Json<PlayerSummary>, ApiError> {
    let platform = state.read().await;
    let player = platform.player(&id)?;
    Ok(Json(PlayerSummary::from(player)))
}

pub async fn get_ledger(
    State(state): State<AppState>,
    Path(id): Path<PlayerId>,
) -> Result<Json<LedgerResponse>, ApiError> {
    let platform = state.read().await;
    let player = platform.player(&id)?;

    let mut entries = player.ledger.clone();
    entries.sort_by(|a, b| a.date.cmp(&b.date));

    Ok(Json(LedgerResponse {
        player_id: player.id.clone(),
        current_rating: player.current_rating,
        ledger_rating: ledger::ledger_rating(player),
        entries,
    }))
}
