//! Join-rating resolution.
//!
//! The baseline a player carries into a match may have been written at join
//! time (placeholder entry, snapshot) or at confirmation time (confirmed
//! entry). Lookups go through [`resolve_join_rating`] only, in this order:
//!
//! 1. the player's ledger entry for this match, if it records a join rating
//! 2. that entry's `rating_after`, if no join rating was recorded
//! 3. the match's join snapshot for the player
//! 4. [`DEFAULT_RATING`]

use serde::Serialize;

use crate::models::{Match, Player, PlayerId, DEFAULT_RATING};

/// Where a resolved rating came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingSource {
    LedgerJoinRating,
    LedgerRatingAfter,
    JoinSnapshot,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedRating {
    pub value: f64,
    pub source: RatingSource,
}

/// Resolve the baseline rating of `player_id` for `game_match`.
///
/// `player` is the player's record if it still exists.
pub fn resolve_join_rating(
    player_id: &PlayerId,
    player: Option<&Player>,
    game_match: &Match,
) -> ResolvedRating {
    if let Some(entry) = player.and_then(|p| p.entry_for_match(&game_match.id)) {
        if let Some(value) = entry.join_rating_used {
            return ResolvedRating {
                value,
                source: RatingSource::LedgerJoinRating,
            };
        }
        return ResolvedRating {
            value: entry.rating_after,
            source: RatingSource::LedgerRatingAfter,
        };
    }

    if let Some(snapshot) = game_match.snapshot_for(player_id) {
        return ResolvedRating {
            value: snapshot.rating_at_join,
            source: RatingSource::JoinSnapshot,
        };
    }

    ResolvedRating {
        value: DEFAULT_RATING,
        source: RatingSource::Default,
    }
}
