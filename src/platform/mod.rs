//! The match-result core.
//!
//! `PlatformState` owns players, matches and result drafts. Every mutating
//! operation reads, validates and writes in one `&mut self` call; callers
//! sharing a state across tasks must hold an exclusive lock for the whole
//! call (see `api::state::AppState`), which is what keeps two racing joins
//! from both passing the capacity check.
//!
//! - **lifecycle**: join, leave, member removal, cancel/delete
//! - **results**: draft create/update/delete and confirmation
//! - **admin**: force operations
//! - **reconcile**: ledger audit and idempotent repair

pub mod admin;
pub mod lifecycle;
pub mod reconcile;
pub mod results;

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::RulesConfig;
use crate::models::{
    CourtId, DraftId, Match, MatchId, Player, PlayerId, ResultDraft, Role, ValidationError,
};
use crate::rating::{RatingEngine, RatingError};

pub use lifecycle::CancelOutcome;
pub use reconcile::{AuditFinding, AuditReport, ReconcileReport};
pub use results::{Confirmation, ConfirmedEntry};

/// Time windows gating lifecycle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    /// Joining closes some hours after the start
    Join,
    /// Leaving closes at the start
    Leave,
    /// Creator/admin removal closes some hours after the start
    Removal,
    /// Results open at the start and close some hours later
    Result,
    /// Cancellation before the start or shortly after the end
    Cancellation,
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeWindow::Join => write!(f, "join"),
            TimeWindow::Leave => write!(f, "leave"),
            TimeWindow::Removal => write!(f, "removal"),
            TimeWindow::Result => write!(f, "result"),
            TimeWindow::Cancellation => write!(f, "cancellation"),
        }
    }
}

/// Errors returned by core operations. Nothing here is retried automatically.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Rating computation failed: {0}")]
    Rating(#[from] RatingError),

    #[error("State conflict: {0}")]
    StateConflict(String),

    #[error("Outside the {0} window")]
    WindowExpired(TimeWindow),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Match {0} is full")]
    Capacity(MatchId),

    #[error("Match {0} already has a result")]
    ResultExists(MatchId),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl CoreError {
    /// Stable code for callers to branch on.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) | CoreError::Rating(_) => "VALIDATION_ERROR",
            CoreError::StateConflict(_) => "STATE_CONFLICT",
            CoreError::WindowExpired(_) => "WINDOW_EXPIRED",
            CoreError::Forbidden(_) => "FORBIDDEN",
            CoreError::Capacity(_) => "CAPACITY",
            CoreError::ResultExists(_) => "RESULT_EXISTS",
            CoreError::NotFound(_) => "NOT_FOUND",
            CoreError::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }

    pub(crate) fn conflict(msg: impl Into<String>) -> Self {
        CoreError::StateConflict(msg.into())
    }

    pub(crate) fn forbidden(msg: impl Into<String>) -> Self {
        CoreError::Forbidden(msg.into())
    }
}

/// Request to create a match.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMatch {
    pub creator: PlayerId,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: u32,
    #[serde(default)]
    pub capacity: Option<usize>,
    #[serde(default)]
    pub court_id: Option<CourtId>,
}

/// All players, matches and drafts.
#[derive(Debug, Clone, Default)]
pub struct PlatformState {
    pub players: HashMap<PlayerId, Player>,
    pub matches: HashMap<MatchId, Match>,
    pub drafts: HashMap<DraftId, ResultDraft>,
    pub rules: RulesConfig,
    engine: RatingEngine,
}

impl PlatformState {
    pub fn new(rules: RulesConfig) -> Self {
        Self {
            rules,
            ..Default::default()
        }
    }

    /// Build a state from persisted records.
    pub fn from_records(
        rules: RulesConfig,
        players: Vec<Player>,
        matches: Vec<Match>,
        drafts: Vec<ResultDraft>,
    ) -> Self {
        Self {
            players: players.into_iter().map(|p| (p.id.clone(), p)).collect(),
            matches: matches.into_iter().map(|m| (m.id.clone(), m)).collect(),
            drafts: drafts.into_iter().map(|d| (d.id.clone(), d)).collect(),
            rules,
            engine: RatingEngine::default(),
        }
    }

    pub fn player(&self, id: &PlayerId) -> Result<&Player, CoreError> {
        self.players
            .get(id)
            .ok_or_else(|| CoreError::NotFound(format!("player {}", id)))
    }

    pub fn get_match(&self, id: &MatchId) -> Result<&Match, CoreError> {
        self.matches
            .get(id)
            .ok_or_else(|| CoreError::NotFound(format!("match {}", id)))
    }

    pub fn draft(&self, id: &DraftId) -> Result<&ResultDraft, CoreError> {
        self.drafts
            .get(id)
            .ok_or_else(|| CoreError::NotFound(format!("draft {}", id)))
    }

    /// The draft or confirmed result of a match, if any.
    pub fn draft_for_match(&self, match_id: &MatchId) -> Option<&ResultDraft> {
        self.drafts.values().find(|d| &d.match_id == match_id)
    }

    /// Returns true if `actor` may manage `game_match` as its creator or a scoped admin.
    pub(crate) fn can_manage(&self, actor: &Player, game_match: &Match) -> bool {
        actor.id == game_match.creator || actor.manages_court(game_match.court_id.as_ref())
    }

    pub(crate) fn require_role(&self, actor_id: &PlayerId, min: Role) -> Result<&Player, CoreError> {
        let actor = self.player(actor_id)?;
        if actor.primary_role() < min {
            return Err(CoreError::forbidden(format!("requires {} role", min)));
        }
        Ok(actor)
    }

    /// Register a new player at the default rating.
    pub fn register_player(&mut self, name: String, roles: Vec<Role>) -> Player {
        let player = Player::new(name).with_roles(roles);
        info!("Registered player {} ({})", player.name, player.id);
        self.players.insert(player.id.clone(), player.clone());
        player
    }

    /// Create a match. The creator joins it immediately.
    pub fn create_match(&mut self, request: NewMatch, now: DateTime<Utc>) -> Result<Match, CoreError> {
        let capacity = request.capacity.unwrap_or(self.rules.default_capacity);
        if !(4..=self.rules.max_capacity).contains(&capacity) {
            return Err(CoreError::InvalidRequest(format!(
                "capacity must be between 4 and {}",
                self.rules.max_capacity
            )));
        }
        if request.duration_minutes == 0 {
            return Err(CoreError::InvalidRequest(
                "duration must be greater than 0".to_string(),
            ));
        }
        if request.start_time <= now {
            return Err(CoreError::WindowExpired(TimeWindow::Join));
        }
        // Every window edge must be representable
        let horizon = self.rules.join_grace().max(self.rules.result_window());
        let in_range = request.start_time.checked_add_signed(horizon).is_some()
            && request
                .start_time
                .checked_add_signed(Duration::minutes(i64::from(request.duration_minutes)))
                .and_then(|end| end.checked_add_signed(self.rules.cancel_after_end()))
                .is_some();
        if !in_range {
            return Err(CoreError::InvalidRequest(
                "start time is too far in the future".to_string(),
            ));
        }

        let creator = self
            .players
            .get_mut(&request.creator)
            .ok_or_else(|| CoreError::NotFound(format!("player {}", request.creator)))?;

        let mut game_match = Match::new(
            creator.id.clone(),
            request.start_time,
            request.duration_minutes,
            capacity,
        );
        if let Some(court) = request.court_id {
            game_match = game_match.with_court(court);
        }

        game_match.add_member(creator.id.clone(), creator.current_rating, now);
        crate::ledger::append_placeholder(creator, &game_match.id, now);

        info!(
            "Match {} created by {} starting {}",
            game_match.id, game_match.creator, game_match.start_time
        );
        self.matches.insert(game_match.id.clone(), game_match.clone());
        Ok(game_match)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for core tests.

    use super::*;
    use chrono::{Duration, TimeZone};

    pub fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 18, 0, 0).unwrap()
    }

    pub fn before_start() -> DateTime<Utc> {
        start() - Duration::hours(2)
    }

    /// A state with four players "a".."d" (a is the creator) on one upcoming
    /// match, plus a fifth registered player "e" not on the roster.
    pub fn four_player_match() -> (PlatformState, MatchId, Vec<PlayerId>) {
        let mut state = PlatformState::new(RulesConfig::default());
        let ids: Vec<PlayerId> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|name| {
                let mut p = Player::new(name.to_string());
                p.id = PlayerId::from(*name);
                state.players.insert(p.id.clone(), p);
                PlayerId::from(*name)
            })
            .collect();

        let m = state
            .create_match(
                NewMatch {
                    creator: ids[0].clone(),
                    start_time: start(),
                    duration_minutes: 90,
                    capacity: Some(5),
                    court_id: Some(CourtId::from("court-1")),
                },
                start() - Duration::days(1),
            )
            .unwrap();
        for id in &ids[1..4] {
            state.join_match(&m.id, id, before_start()).unwrap();
        }
        (state, m.id, ids)
    }

    pub fn ledger_invariant_holds(state: &PlatformState) -> bool {
        state
            .players
            .values()
            .all(|p| crate::ledger::drift(p).abs() <= 0.01)
    }
}
