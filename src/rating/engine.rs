//! Rating engine: per-game deltas from join-time baselines.
//!
//! For each game a player appears in:
//!
//! ```text
//! expected = 1 / (1 + 10^(opp_avg - user_avg))
//! delta    = round(K * (score - expected), 2)
//! ```
//!
//! where the averages are taken over each team's *join* ratings, never the
//! live ones, so results confirmed in between cannot leak into this match.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use super::{expected_score, round2, K_FACTOR};
use crate::models::{Game, GameContribution, PlayerId, Side, DEFAULT_RATING};

/// Errors that abort a rating computation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RatingError {
    #[error("game {game}: no baseline rating for player {player}")]
    MissingBaseline { game: usize, player: PlayerId },

    #[error("game {game}: team average is not finite")]
    NonFiniteAverage { game: usize },
}

/// One player's share of a confirmed result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerOutcome {
    pub player_id: PlayerId,
    /// Baseline used for every game of this match
    pub join_rating: f64,
    pub total_delta: f64,
    pub breakdown: Vec<GameContribution>,
}

impl PlayerOutcome {
    pub fn games_played(&self) -> usize {
        self.breakdown.len()
    }

    /// Rating after applying this outcome to `current`.
    pub fn rating_after(&self, current: f64) -> f64 {
        round2(current + self.total_delta)
    }
}

/// Outcome for a whole roster, in roster order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchOutcome {
    pub players: Vec<PlayerOutcome>,
}

impl MatchOutcome {
    pub fn get(&self, player_id: &PlayerId) -> Option<&PlayerOutcome> {
        self.players.iter().find(|o| &o.player_id == player_id)
    }
}

/// Pure rating computation.
#[derive(Debug, Clone, Copy)]
pub struct RatingEngine {
    k: f64,
}

impl Default for RatingEngine {
    fn default() -> Self {
        Self { k: K_FACTOR }
    }
}

impl RatingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn team_average(
        &self,
        game_index: usize,
        team: &[PlayerId; 2],
        baselines: &HashMap<PlayerId, f64>,
    ) -> Result<f64, RatingError> {
        let mut sum = 0.0;
        for player in team {
            let rating = baselines
                .get(player)
                .ok_or_else(|| RatingError::MissingBaseline {
                    game: game_index,
                    player: player.clone(),
                })?;
            sum += rating;
        }
        let avg = sum / team.len() as f64;
        if !avg.is_finite() {
            return Err(RatingError::NonFiniteAverage { game: game_index });
        }
        Ok(avg)
    }

    /// Contribution of one game to one side.
    fn contribution(
        &self,
        game_index: usize,
        game: &Game,
        side: Side,
        team1_avg: f64,
        team2_avg: f64,
    ) -> GameContribution {
        let (user_avg, opp_avg) = match side {
            Side::Team1 => (team1_avg, team2_avg),
            Side::Team2 => (team2_avg, team1_avg),
        };
        let expected = expected_score(user_avg, opp_avg);
        let score = match game.winner() {
            Some(winner) if winner == side => 1.0,
            Some(_) => 0.0,
            None => 0.5,
        };
        GameContribution {
            game_index,
            side,
            user_avg,
            opp_avg,
            expected,
            score,
            delta: round2(self.k * (score - expected)),
        }
    }

    /// Compute per-player outcomes for a confirmed result.
    ///
    /// `baselines` must hold a join rating for every player in `games`.
    /// Every roster member gets an outcome; those in no game get a zero delta
    /// and an empty breakdown. Fails without partial output if any game has
    /// an unresolved or non-finite team average.
    pub fn compute(
        &self,
        roster: &[PlayerId],
        games: &[Game],
        baselines: &HashMap<PlayerId, f64>,
    ) -> Result<MatchOutcome, RatingError> {
        let mut breakdowns: HashMap<&PlayerId, Vec<GameContribution>> = HashMap::new();

        for (index, game) in games.iter().enumerate() {
            let team1_avg = self.team_average(index, &game.team1, baselines)?;
            let team2_avg = self.team_average(index, &game.team2, baselines)?;

            for side in [Side::Team1, Side::Team2] {
                let contribution = self.contribution(index, game, side, team1_avg, team2_avg);
                for player in game.team(side) {
                    breakdowns
                        .entry(player)
                        .or_default()
                        .push(contribution.clone());
                }
            }
        }

        let players = roster
            .iter()
            .map(|player_id| {
                let breakdown = breakdowns.remove(player_id).unwrap_or_default();
                let total_delta = round2(breakdown.iter().map(|c| c.delta).sum());
                PlayerOutcome {
                    player_id: player_id.clone(),
                    join_rating: baselines
                        .get(player_id)
                        .copied()
                        .unwrap_or(DEFAULT_RATING),
                    total_delta,
                    breakdown,
                }
            })
            .collect();

        Ok(MatchOutcome { players })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> PlayerId {
        PlayerId::from(s)
    }

    fn game(t1: [&str; 2], t2: [&str; 2], s1: u32, s2: u32) -> Game {
        Game {
            team1: [id(t1[0]), id(t1[1])],
            team2: [id(t2[0]), id(t2[1])],
            team1_score: s1,
            team2_score: s2,
        }
    }

    fn baselines(pairs: &[(&str, f64)]) -> HashMap<PlayerId, f64> {
        pairs.iter().map(|(p, r)| (id(p), *r)).collect()
    }

    fn roster(names: &[&str]) -> Vec<PlayerId> {
        names.iter().map(|n| id(n)).collect()
    }

    #[test]
    fn test_balanced_win_is_symmetric() {
        let engine = RatingEngine::new();
        let outcome = engine
            .compute(
                &roster(&["a", "b", "c", "d"]),
                &[game(["a", "b"], ["c", "d"], 25, 20)],
                &baselines(&[("a", 2.0), ("b", 2.0), ("c", 2.0), ("d", 2.0)]),
            )
            .unwrap();

        for (p, delta, after) in [
            ("a", 0.05, 2.05),
            ("b", 0.05, 2.05),
            ("c", -0.05, 1.95),
            ("d", -0.05, 1.95),
        ] {
            let o = outcome.get(&id(p)).unwrap();
            assert_eq!(o.total_delta, delta, "delta for {}", p);
            assert_eq!(o.rating_after(2.0), after, "rating for {}", p);
            assert_eq!(o.breakdown[0].expected, 0.5);
        }
    }

    #[test]
    fn test_tie_between_equal_teams_is_zero() {
        let engine = RatingEngine::new();
        let outcome = engine
            .compute(
                &roster(&["a", "b", "c", "d"]),
                &[game(["a", "b"], ["c", "d"], 21, 21)],
                &baselines(&[("a", 2.0), ("b", 2.0), ("c", 2.0), ("d", 2.0)]),
            )
            .unwrap();
        assert!(outcome.players.iter().all(|o| o.total_delta == 0.0));
        assert_eq!(outcome.players[0].breakdown[0].score, 0.5);
    }

    #[test]
    fn test_upset_moves_more_than_expected_win() {
        let engine = RatingEngine::new();
        let ratings = baselines(&[("a", 1.5), ("b", 1.5), ("c", 2.5), ("d", 2.5)]);
        let upset = engine
            .compute(
                &roster(&["a", "b", "c", "d"]),
                &[game(["a", "b"], ["c", "d"], 21, 10)],
                &ratings,
            )
            .unwrap();
        let favourite = engine
            .compute(
                &roster(&["a", "b", "c", "d"]),
                &[game(["a", "b"], ["c", "d"], 10, 21)],
                &ratings,
            )
            .unwrap();

        let upset_gain = upset.get(&id("a")).unwrap().total_delta;
        let favourite_gain = favourite.get(&id("c")).unwrap().total_delta;
        // expected for the underdogs is 1/11, so K * 10/11 rounds to 0.09
        assert_eq!(upset_gain, 0.09);
        assert_eq!(favourite_gain, 0.01);
    }

    #[test]
    fn test_multi_game_sums_per_game_deltas() {
        let engine = RatingEngine::new();
        let outcome = engine
            .compute(
                &roster(&["a", "b", "c", "d"]),
                &[
                    game(["a", "b"], ["c", "d"], 21, 15),
                    game(["a", "c"], ["b", "d"], 21, 19),
                    game(["a", "d"], ["b", "c"], 12, 21),
                ],
                &baselines(&[("a", 2.0), ("b", 2.0), ("c", 2.0), ("d", 2.0)]),
            )
            .unwrap();

        // a: win, win, loss
        let a = outcome.get(&id("a")).unwrap();
        assert_eq!(a.games_played(), 3);
        assert_eq!(a.total_delta, 0.05);
        // b: win, loss, win
        assert_eq!(outcome.get(&id("b")).unwrap().total_delta, 0.05);
        // d: loss, loss, loss
        assert_eq!(outcome.get(&id("d")).unwrap().total_delta, -0.15);
    }

    #[test]
    fn test_per_game_team_averages() {
        let engine = RatingEngine::new();
        let outcome = engine
            .compute(
                &roster(&["a", "b", "c", "d"]),
                &[game(["a", "b"], ["c", "d"], 21, 15)],
                &baselines(&[("a", 2.4), ("b", 2.0), ("c", 1.8), ("d", 2.2)]),
            )
            .unwrap();
        let c = &outcome.get(&id("c")).unwrap().breakdown[0];
        assert!((c.user_avg - 2.0).abs() < 1e-12);
        assert!((c.opp_avg - 2.2).abs() < 1e-12);
        assert_eq!(c.side, Side::Team2);
        assert_eq!(c.score, 0.0);
    }

    #[test]
    fn test_bench_player_gets_empty_outcome() {
        let engine = RatingEngine::new();
        let outcome = engine
            .compute(
                &roster(&["a", "b", "c", "d", "e"]),
                &[game(["a", "b"], ["c", "d"], 21, 15)],
                &baselines(&[("a", 2.0), ("b", 2.0), ("c", 2.0), ("d", 2.0), ("e", 2.3)]),
            )
            .unwrap();
        let e = outcome.get(&id("e")).unwrap();
        assert_eq!(e.total_delta, 0.0);
        assert_eq!(e.games_played(), 0);
        assert_eq!(e.join_rating, 2.3);
        assert_eq!(outcome.players.len(), 5);
    }

    #[test]
    fn test_result_independent_of_roster_order() {
        let engine = RatingEngine::new();
        let games = [
            game(["a", "b"], ["c", "d"], 21, 15),
            game(["a", "c"], ["b", "d"], 18, 21),
        ];
        let ratings = baselines(&[("a", 2.3), ("b", 1.9), ("c", 2.1), ("d", 2.0)]);

        let forward = engine
            .compute(&roster(&["a", "b", "c", "d"]), &games, &ratings)
            .unwrap();
        let backward = engine
            .compute(&roster(&["d", "c", "b", "a"]), &games, &ratings)
            .unwrap();

        for p in ["a", "b", "c", "d"] {
            assert_eq!(forward.get(&id(p)), backward.get(&id(p)));
        }
    }

    #[test]
    fn test_non_finite_rating_aborts() {
        let engine = RatingEngine::new();
        let err = engine
            .compute(
                &roster(&["a", "b", "c", "d"]),
                &[game(["a", "b"], ["c", "d"], 21, 15)],
                &baselines(&[("a", f64::NAN), ("b", 2.0), ("c", 2.0), ("d", 2.0)]),
            )
            .unwrap_err();
        assert_eq!(err, RatingError::NonFiniteAverage { game: 0 });
    }

    #[test]
    fn test_missing_baseline_aborts() {
        let engine = RatingEngine::new();
        let err = engine
            .compute(
                &roster(&["a", "b", "c", "d"]),
                &[game(["a", "b"], ["c", "d"], 21, 15)],
                &baselines(&[("a", 2.0), ("b", 2.0), ("c", 2.0)]),
            )
            .unwrap_err();
        assert!(matches!(err, RatingError::MissingBaseline { game: 0, .. }));
    }
}
