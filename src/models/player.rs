//! Players, their roles and their rating ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CourtId, EntityId, LedgerEntry, MatchId, PlayerId};

/// Rating every player starts from, and the baseline the ledger sums against.
pub const DEFAULT_RATING: f64 = 2.0;

/// Platform roles, ordered by privilege.
///
/// The derive order matters: `Player < CourtAdmin < Admin < SuperAdmin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular participant
    #[default]
    Player,
    /// Manages matches on the courts listed in `managed_courts`
    CourtAdmin,
    /// Manages any match, subject to the usual time windows
    Admin,
    /// Unrestricted; may act outside every time window
    SuperAdmin,
}

impl Role {
    /// Returns true if the role bypasses time windows.
    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Role::SuperAdmin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Player => write!(f, "player"),
            Role::CourtAdmin => write!(f, "court_admin"),
            Role::Admin => write!(f, "admin"),
            Role::SuperAdmin => write!(f, "super_admin"),
        }
    }
}

/// Resolve the effective role from a legacy single role plus a role set.
///
/// The most privileged role wins. A player with neither is a `Player`.
pub fn primary_role(legacy: Option<Role>, roles: &[Role]) -> Role {
    roles
        .iter()
        .copied()
        .chain(legacy)
        .max()
        .unwrap_or_default()
}

/// A registered player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,

    pub name: String,

    /// Live rating; always `DEFAULT_RATING + Σ ledger deltas`
    pub current_rating: f64,

    /// Legacy single-role field kept for older records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    #[serde(default)]
    pub roles: Vec<Role>,

    /// Courts a `CourtAdmin` is scoped to
    #[serde(default)]
    pub managed_courts: Vec<CourtId>,

    /// Append-only rating history
    #[serde(default)]
    pub ledger: Vec<LedgerEntry>,

    pub created_at: DateTime<Utc>,
}

impl Player {
    /// Create a new player at the default rating.
    pub fn new(name: String) -> Self {
        Self {
            id: EntityId::random(),
            name,
            current_rating: DEFAULT_RATING,
            role: None,
            roles: Vec::new(),
            managed_courts: Vec::new(),
            ledger: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Builder method to set roles.
    pub fn with_roles(mut self, roles: Vec<Role>) -> Self {
        self.roles = roles;
        self
    }

    /// Builder method to set managed courts.
    pub fn with_managed_courts(mut self, courts: Vec<CourtId>) -> Self {
        self.managed_courts = courts;
        self
    }

    pub fn primary_role(&self) -> Role {
        primary_role(self.role, &self.roles)
    }

    /// Returns true if this player may manage a match on the given court.
    pub fn manages_court(&self, court: Option<&CourtId>) -> bool {
        match self.primary_role() {
            Role::Admin | Role::SuperAdmin => true,
            Role::CourtAdmin => court.is_some_and(|c| self.managed_courts.contains(c)),
            Role::Player => false,
        }
    }

    /// The ledger entry for a match, if any.
    pub fn entry_for_match(&self, match_id: &MatchId) -> Option<&LedgerEntry> {
        self.ledger.iter().find(|e| &e.match_id == match_id)
    }

    /// Sum of all ledger deltas.
    pub fn ledger_sum(&self) -> f64 {
        self.ledger.iter().map(|e| e.delta).sum()
    }
}
