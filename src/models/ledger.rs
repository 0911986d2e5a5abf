//! Rating ledger entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EntityId, LedgerEntryId, MatchId, PlayerId};

/// Whether an entry is the join-time placeholder or a confirmed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Zero-delta marker written on join
    Placeholder,
    /// Outcome of a confirmed result
    #[default]
    Confirmed,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Placeholder => write!(f, "placeholder"),
            EntryKind::Confirmed => write!(f, "confirmed"),
        }
    }
}

/// Which side of a game a player was on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Team1,
    Team2,
}

/// One game's contribution to a player's match delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameContribution {
    /// Position of the game in the draft
    pub game_index: usize,
    pub side: Side,
    pub user_avg: f64,
    pub opp_avg: f64,
    pub expected: f64,
    /// 1.0 win, 0.5 tie, 0.0 loss
    pub score: f64,
    pub delta: f64,
}

/// One line of a player's rating history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,

    pub date: DateTime<Utc>,

    pub match_id: MatchId,

    pub delta: f64,

    pub rating_after: f64,

    /// Baseline the engine used; older records may lack it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_rating_used: Option<f64>,

    #[serde(default)]
    pub game_breakdown: Vec<GameContribution>,

    #[serde(default)]
    pub kind: EntryKind,
}

impl LedgerEntry {
    /// Zero-delta entry recorded when a player joins a match.
    pub fn placeholder(
        player_id: &PlayerId,
        match_id: MatchId,
        rating: f64,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Self::entry_id(player_id, &match_id, EntryKind::Placeholder),
            date,
            match_id,
            delta: 0.0,
            rating_after: rating,
            join_rating_used: Some(rating),
            game_breakdown: Vec::new(),
            kind: EntryKind::Placeholder,
        }
    }

    /// Entry produced by confirming a result.
    pub fn confirmed(
        player_id: &PlayerId,
        match_id: MatchId,
        delta: f64,
        rating_after: f64,
        join_rating_used: f64,
        game_breakdown: Vec<GameContribution>,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Self::entry_id(player_id, &match_id, EntryKind::Confirmed),
            date,
            match_id,
            delta,
            rating_after,
            join_rating_used: Some(join_rating_used),
            game_breakdown,
            kind: EntryKind::Confirmed,
        }
    }

    /// Deterministic ID, so a replayed write produces the same entry.
    pub fn entry_id(player_id: &PlayerId, match_id: &MatchId, kind: EntryKind) -> EntityId {
        EntityId::generate(&[player_id.as_str(), match_id.as_str(), &kind.to_string()])
    }

    pub fn is_placeholder(&self) -> bool {
        self.kind == EntryKind::Placeholder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_zero_delta() {
        let e = LedgerEntry::placeholder(
            &EntityId::from("p1"),
            EntityId::from("m1"),
            2.13,
            Utc::now(),
        );
        assert!(e.is_placeholder());
        assert_eq!(e.delta, 0.0);
        assert_eq!(e.rating_after, 2.13);
        assert_eq!(e.join_rating_used, Some(2.13));
        assert!(e.game_breakdown.is_empty());
    }

    #[test]
    fn test_entry_ids_differ_by_kind() {
        let player = EntityId::from("p1");
        let m = EntityId::from("m1");
        let placeholder = LedgerEntry::placeholder(&player, m.clone(), 2.0, Utc::now());
        let confirmed =
            LedgerEntry::confirmed(&player, m, 0.05, 2.05, 2.0, Vec::new(), Utc::now());
        assert_ne!(placeholder.id, confirmed.id);
    }

    #[test]
    fn test_entry_without_join_rating_deserializes() {
        let json = r#"{
            "id": "e1",
            "date": "2026-03-01T10:00:00Z",
            "match_id": "m1",
            "delta": 0.05,
            "rating_after": 2.05
        }"#;
        let e: LedgerEntry = serde_json::from_str(json).unwrap();
        assert_eq!(e.join_rating_used, None);
        assert_eq!(e.kind, EntryKind::Confirmed);
        assert!(e.game_breakdown.is_empty());
    }

    #[test]
    fn test_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&EntryKind::Placeholder).unwrap(),
            "\"placeholder\""
        );
        assert_eq!(serde_json::to_string(&Side::Team2).unwrap(), "\"team2\"");
    }
}
