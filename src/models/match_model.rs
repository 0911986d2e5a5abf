//! Matches, their roster and join-time rating snapshots.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{CourtId, EntityId, MatchId, PlayerId};

/// Lifecycle state of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchState {
    #[default]
    Upcoming,
    Finished,
    Cancelled,
}

impl MatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchState::Finished | MatchState::Cancelled)
    }
}

impl std::fmt::Display for MatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchState::Upcoming => write!(f, "upcoming"),
            MatchState::Finished => write!(f, "finished"),
            MatchState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A player's rating captured when they joined. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSnapshot {
    pub player_id: PlayerId,
    pub rating_at_join: f64,
    pub joined_at: DateTime<Utc>,
}

/// A scheduled doubles match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,

    pub creator: PlayerId,

    /// Court from the booking system, used to scope court admins
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub court_id: Option<CourtId>,

    pub start_time: DateTime<Utc>,

    pub duration_minutes: u32,

    /// Maximum roster size
    pub capacity: usize,

    /// Roster in join order; no duplicates
    pub roster: Vec<PlayerId>,

    pub state: MatchState,

    /// Exactly one per roster member
    pub join_snapshots: Vec<JoinSnapshot>,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl Match {
    /// Create a new upcoming match with an empty roster.
    pub fn new(
        creator: PlayerId,
        start_time: DateTime<Utc>,
        duration_minutes: u32,
        capacity: usize,
    ) -> Self {
        Self {
            id: EntityId::random(),
            creator,
            court_id: None,
            start_time,
            duration_minutes,
            capacity,
            roster: Vec::new(),
            state: MatchState::Upcoming,
            join_snapshots: Vec::new(),
            created_at: Utc::now(),
            closed_at: None,
        }
    }

    /// Builder method to set the court.
    pub fn with_court(mut self, court_id: CourtId) -> Self {
        self.court_id = Some(court_id);
        self
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + Duration::minutes(i64::from(self.duration_minutes))
    }

    pub fn is_member(&self, player_id: &PlayerId) -> bool {
        self.roster.contains(player_id)
    }

    pub fn is_full(&self) -> bool {
        self.roster.len() >= self.capacity
    }

    pub fn snapshot_for(&self, player_id: &PlayerId) -> Option<&JoinSnapshot> {
        self.join_snapshots.iter().find(|s| &s.player_id == player_id)
    }

    /// Add a member together with their join snapshot.
    /// Returns false if the player is already on the roster.
    pub fn add_member(&mut self, player_id: PlayerId, rating: f64, at: DateTime<Utc>) -> bool {
        if self.is_member(&player_id) {
            return false;
        }
        self.join_snapshots.push(JoinSnapshot {
            player_id: player_id.clone(),
            rating_at_join: rating,
            joined_at: at,
        });
        self.roster.push(player_id);
        true
    }

    /// Remove a member and their snapshot.
    /// Returns false if the player was not on the roster.
    pub fn remove_member(&mut self, player_id: &PlayerId) -> bool {
        let before = self.roster.len();
        self.roster.retain(|p| p != player_id);
        self.join_snapshots.retain(|s| &s.player_id != player_id);
        self.roster.len() != before
    }
}
