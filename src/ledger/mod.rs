//! Rating ledger operations.
//!
//! Each player's ledger is the audit source of truth for their rating:
//! `current_rating == DEFAULT_RATING + Σ delta` must hold after every
//! mutation. A player has at most one entry per match, either the
//! join-time placeholder or the confirmed result, never both.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use crate::models::{LedgerEntry, MatchId, Player, DEFAULT_RATING};
use crate::rating::{round2, PlayerOutcome};

/// Errors raised by ledger writes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("player {player} already has a confirmed entry for match {match_id}")]
    AlreadyApplied { player: String, match_id: MatchId },
}

/// Append the join-time placeholder for a match.
///
/// Returns false, leaving the ledger untouched, if the player already has
/// an entry for the match.
pub fn append_placeholder(player: &mut Player, match_id: &MatchId, at: DateTime<Utc>) -> bool {
    if player.entry_for_match(match_id).is_some() {
        return false;
    }
    let entry = LedgerEntry::placeholder(&player.id, match_id.clone(), player.current_rating, at);
    debug!(
        "Placeholder for {} in match {} at rating {}",
        player.id, match_id, player.current_rating
    );
    player.ledger.push(entry);
    true
}

/// Remove placeholder entries for a match. Confirmed entries are never touched.
/// Returns the number removed.
pub fn remove_placeholder(player: &mut Player, match_id: &MatchId) -> usize {
    let before = player.ledger.len();
    player
        .ledger
        .retain(|e| !(e.is_placeholder() && &e.match_id == match_id));
    before - player.ledger.len()
}

/// Returns true if the player already holds a confirmed entry for the match.
pub fn has_confirmed_entry(player: &Player, match_id: &MatchId) -> bool {
    player
        .ledger
        .iter()
        .any(|e| !e.is_placeholder() && &e.match_id == match_id)
}

/// Apply a confirmed outcome to a player's ledger.
///
/// Supersedes the placeholder, appends the confirmed entry and moves
/// `current_rating` when the player played at least one game.
pub fn apply(
    player: &mut Player,
    match_id: &MatchId,
    outcome: &PlayerOutcome,
    at: DateTime<Utc>,
) -> Result<LedgerEntry, LedgerError> {
    if has_confirmed_entry(player, match_id) {
        return Err(LedgerError::AlreadyApplied {
            player: player.id.to_string(),
            match_id: match_id.clone(),
        });
    }

    remove_placeholder(player, match_id);

    let played = outcome.games_played() > 0;
    let rating_after = if played {
        outcome.rating_after(player.current_rating)
    } else {
        round2(player.current_rating)
    };
    let delta = if played { outcome.total_delta } else { 0.0 };

    let entry = LedgerEntry::confirmed(
        &player.id,
        match_id.clone(),
        delta,
        rating_after,
        outcome.join_rating,
        outcome.breakdown.clone(),
        at,
    );
    player.ledger.push(entry.clone());

    if played {
        player.current_rating = rating_after;
    }

    debug!(
        "Applied {:+.2} to {} for match {} (now {:.2})",
        delta, player.id, match_id, player.current_rating
    );
    Ok(entry)
}

/// The rating the ledger says a player should have.
pub fn ledger_rating(player: &Player) -> f64 {
    round2(DEFAULT_RATING + player.ledger_sum())
}

/// Difference between the stored rating and the ledger rating.
pub fn drift(player: &Player) -> f64 {
    player.current_rating - ledger_rating(player)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityId, GameContribution, Side};

    fn outcome(player: &Player, deltas: &[f64], join_rating: f64) -> PlayerOutcome {
        let breakdown: Vec<GameContribution> = deltas
            .iter()
            .enumerate()
            .map(|(i, d)| GameContribution {
                game_index: i,
                side: Side::Team1,
                user_avg: 2.0,
                opp_avg: 2.0,
                expected: 0.5,
                score: if *d > 0.0 { 1.0 } else { 0.0 },
                delta: *d,
            })
            .collect();
        PlayerOutcome {
            player_id: player.id.clone(),
            join_rating,
            total_delta: round2(deltas.iter().sum()),
            breakdown,
        }
    }

    #[test]
    fn test_placeholder_once_per_match() {
        let mut p = Player::new("Alice".to_string());
        let m = EntityId::from("m1");
        assert!(append_placeholder(&mut p, &m, Utc::now()));
        assert!(!append_placeholder(&mut p, &m, Utc::now()));
        assert_eq!(p.ledger.len(), 1);
        assert_eq!(p.current_rating, DEFAULT_RATING);
    }

    #[test]
    fn test_apply_supersedes_placeholder() {
        let mut p = Player::new("Alice".to_string());
        let m = EntityId::from("m1");
        append_placeholder(&mut p, &m, Utc::now());

        let o = outcome(&p, &[0.05], 2.0);
        let entry = apply(&mut p, &m, &o, Utc::now()).unwrap();

        assert_eq!(p.ledger.len(), 1);
        assert!(!p.ledger[0].is_placeholder());
        assert_eq!(entry.rating_after, 2.05);
        assert_eq!(p.current_rating, 2.05);
        assert_eq!(drift(&p), 0.0);
    }

    #[test]
    fn test_apply_without_games_keeps_rating() {
        let mut p = Player::new("Bench".to_string());
        p.current_rating = 2.2;
        p.ledger.push(LedgerEntry::confirmed(
            &p.id,
            EntityId::from("earlier"),
            0.2,
            2.2,
            2.0,
            Vec::new(),
            Utc::now(),
        ));
        let m = EntityId::from("m1");
        append_placeholder(&mut p, &m, Utc::now());

        let o = outcome(&p, &[], 2.2);
        let entry = apply(&mut p, &m, &o, Utc::now()).unwrap();

        assert_eq!(entry.delta, 0.0);
        assert_eq!(entry.rating_after, 2.2);
        assert!(entry.game_breakdown.is_empty());
        assert_eq!(p.current_rating, 2.2);
        assert_eq!(p.ledger.len(), 2);
    }

    #[test]
    fn test_apply_twice_is_rejected() {
        let mut p = Player::new("Alice".to_string());
        let m = EntityId::from("m1");
        let o = outcome(&p, &[0.05, 0.03], 2.0);
        apply(&mut p, &m, &o, Utc::now()).unwrap();

        let err = apply(&mut p, &m, &o, Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyApplied { .. }));
        assert_eq!(p.ledger.len(), 1);
        assert_eq!(p.current_rating, 2.08);
    }

    #[test]
    fn test_remove_placeholder_leaves_confirmed() {
        let mut p = Player::new("Alice".to_string());
        let m1 = EntityId::from("m1");
        let m2 = EntityId::from("m2");
        let o = outcome(&p, &[0.05], 2.0);
        apply(&mut p, &m1, &o, Utc::now()).unwrap();
        append_placeholder(&mut p, &m2, Utc::now());

        assert_eq!(remove_placeholder(&mut p, &m1), 0);
        assert_eq!(remove_placeholder(&mut p, &m2), 1);
        assert_eq!(p.ledger.len(), 1);
    }

    #[test]
    fn test_drift_detects_tampering() {
        let mut p = Player::new("Alice".to_string());
        let m = EntityId::from("m1");
        let o = outcome(&p, &[-0.05], 2.0);
        apply(&mut p, &m, &o, Utc::now()).unwrap();
        assert_eq!(ledger_rating(&p), 1.95);

        p.current_rating = 2.5;
        assert!((drift(&p) - 0.55).abs() < 1e-9);
    }
}
