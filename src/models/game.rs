//! Games (2v2) and the validation of submitted game payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

use super::{PlayerId, Side};

/// A validated doubles game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub team1: [PlayerId; 2],
    pub team2: [PlayerId; 2],
    pub team1_score: u32,
    pub team2_score: u32,
}

impl Game {
    /// Side that won, or None on a tie.
    pub fn winner(&self) -> Option<Side> {
        use std::cmp::Ordering;
        match self.team1_score.cmp(&self.team2_score) {
            Ordering::Greater => Some(Side::Team1),
            Ordering::Less => Some(Side::Team2),
            Ordering::Equal => None,
        }
    }

    pub fn team(&self, side: Side) -> &[PlayerId; 2] {
        match side {
            Side::Team1 => &self.team1,
            Side::Team2 => &self.team2,
        }
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerId> {
        self.team1.iter().chain(self.team2.iter())
    }
}

/// A game as submitted by a caller, before validation.
///
/// Teams and scores are loosely typed so that malformed payloads surface
/// as validation issues instead of deserialization failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameInput {
    #[serde(default)]
    pub team1: Vec<PlayerId>,
    #[serde(default)]
    pub team2: Vec<PlayerId>,
    #[serde(default)]
    pub team1_score: Value,
    #[serde(default)]
    pub team2_score: Value,
}

/// A single problem found in a game payload.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum GameIssue {
    #[error("result has no games")]
    NoGames,

    #[error("game {game}: {side:?} has {size} players, expected 2")]
    TeamSize { game: usize, side: Side, size: usize },

    #[error("game {game}: player {player} appears more than once")]
    DuplicatePlayer { game: usize, player: String },

    #[error("game {game}: player {player} is not on the match roster")]
    NotOnRoster { game: usize, player: String },

    #[error("game {game}: {side:?} score {value} is not a non-negative integer")]
    InvalidScore { game: usize, side: Side, value: String },
}

/// All issues found in a submitted set of games. Reported as one failure.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("invalid games: {}", format_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<GameIssue>,
}

impl ValidationError {
    pub fn single(issue: GameIssue) -> Self {
        Self {
            issues: vec![issue],
        }
    }
}

fn format_issues(issues: &[GameIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn parse_score(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|n| u32::try_from(n).ok())
}

fn parse_team(
    game: usize,
    side: Side,
    team: &[PlayerId],
    issues: &mut Vec<GameIssue>,
) -> Option<[PlayerId; 2]> {
    match team {
        [a, b] => Some([a.clone(), b.clone()]),
        _ => {
            issues.push(GameIssue::TeamSize {
                game,
                side,
                size: team.len(),
            });
            None
        }
    }
}

/// Validate submitted games against a roster.
///
/// Every game is checked and every issue collected; any issue rejects the
/// whole set.
pub fn validate_games(
    inputs: &[GameInput],
    roster: &[PlayerId],
) -> Result<Vec<Game>, ValidationError> {
    if inputs.is_empty() {
        return Err(ValidationError::single(GameIssue::NoGames));
    }

    let mut issues = Vec::new();
    let mut games = Vec::with_capacity(inputs.len());

    for (index, input) in inputs.iter().enumerate() {
        let team1 = parse_team(index, Side::Team1, &input.team1, &mut issues);
        let team2 = parse_team(index, Side::Team2, &input.team2, &mut issues);

        let mut seen = HashSet::new();
        for player in input.team1.iter().chain(input.team2.iter()) {
            if !seen.insert(player) {
                issues.push(GameIssue::DuplicatePlayer {
                    game: index,
                    player: player.to_string(),
                });
            } else if !roster.contains(player) {
                issues.push(GameIssue::NotOnRoster {
                    game: index,
                    player: player.to_string(),
                });
            }
        }

        let team1_score = parse_score(&input.team1_score);
        if team1_score.is_none() {
            issues.push(GameIssue::InvalidScore {
                game: index,
                side: Side::Team1,
                value: input.team1_score.to_string(),
            });
        }
        let team2_score = parse_score(&input.team2_score);
        if team2_score.is_none() {
            issues.push(GameIssue::InvalidScore {
                game: index,
                side: Side::Team2,
                value: input.team2_score.to_string(),
            });
        }

        if let (Some(team1), Some(team2), Some(team1_score), Some(team2_score)) =
            (team1, team2, team1_score, team2_score)
        {
            games.push(Game {
                team1,
                team2,
                team1_score,
                team2_score,
            });
        }
    }

    if issues.is_empty() {
        Ok(games)
    } else {
        Err(ValidationError { issues })
    }
}
