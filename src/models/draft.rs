//! Result drafts: proposed game outcomes for a match, pre-confirmation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DraftId, EntityId, Game, MatchId, PlayerId};

/// The (at most one) result record of a match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultDraft {
    pub id: DraftId,

    pub match_id: MatchId,

    pub games: Vec<Game>,

    pub created_by: PlayerId,

    pub confirmed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_by: Option<PlayerId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl ResultDraft {
    pub fn new(match_id: MatchId, created_by: PlayerId, games: Vec<Game>, at: DateTime<Utc>) -> Self {
        Self {
            id: EntityId::random(),
            match_id,
            games,
            created_by,
            confirmed: false,
            confirmed_by: None,
            confirmed_at: None,
            created_at: at,
            updated_at: at,
        }
    }

    /// Replace the games and clear any stale confirmation metadata.
    pub fn replace_games(&mut self, games: Vec<Game>, at: DateTime<Utc>) {
        self.games = games;
        self.confirmed_by = None;
        self.confirmed_at = None;
        self.updated_at = at;
    }

    /// Mark as confirmed. The draft is read-only from here on.
    pub fn confirm(&mut self, by: PlayerId, at: DateTime<Utc>) {
        self.confirmed = true;
        self.confirmed_by = Some(by);
        self.confirmed_at = Some(at);
        self.updated_at = at;
    }

    /// Distinct players appearing in any game.
    pub fn players(&self) -> Vec<&PlayerId> {
        let mut players: Vec<&PlayerId> = Vec::new();
        for p in self.games.iter().flat_map(|g| g.players()) {
            if !players.contains(&p) {
                players.push(p);
            }
        }
        players
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(a: &str, b: &str, c: &str, d: &str) -> Game {
        Game {
            team1: [a.into(), b.into()],
            team2: [c.into(), d.into()],
            team1_score: 21,
            team2_score: 17,
        }
    }

    #[test]
    fn test_new_draft_is_unconfirmed() {
        let d = ResultDraft::new("m1".into(), "a".into(), vec![game("a", "b", "c", "d")], Utc::now());
        assert!(!d.confirmed);
        assert!(d.confirmed_by.is_none());
        assert_eq!(d.created_at, d.updated_at);
    }

    #[test]
    fn test_replace_games_clears_confirmation_metadata() {
        let mut d =
            ResultDraft::new("m1".into(), "a".into(), vec![game("a", "b", "c", "d")], Utc::now());
        d.confirmed_by = Some("b".into());
        d.confirmed_at = Some(Utc::now());

        d.replace_games(vec![game("a", "c", "b", "d")], Utc::now());
        assert!(d.confirmed_by.is_none());
        assert!(d.confirmed_at.is_none());
        assert_eq!(d.games[0].team1[1], PlayerId::from("c"));
    }

    #[test]
    fn test_confirm_sets_metadata() {
        let mut d =
            ResultDraft::new("m1".into(), "a".into(), vec![game("a", "b", "c", "d")], Utc::now());
        let at = Utc::now();
        d.confirm("c".into(), at);
        assert!(d.confirmed);
        assert_eq!(d.confirmed_by, Some(PlayerId::from("c")));
        assert_eq!(d.confirmed_at, Some(at));
    }

    #[test]
    fn test_players_are_distinct() {
        let d = ResultDraft::new(
            "m1".into(),
            "a".into(),
            vec![game("a", "b", "c", "d"), game("a", "c", "b", "e")],
            Utc::now(),
        );
        assert_eq!(d.players().len(), 5);
    }
}
