//! Skill-rating computation.
//!
//! - **engine**: per-game Elo-style deltas for a confirmed result
//! - **resolver**: the baseline rating a player carries into a match

pub mod engine;
pub mod resolver;

pub use engine::{MatchOutcome, PlayerOutcome, RatingEngine, RatingError};
pub use resolver::{resolve_join_rating, RatingSource, ResolvedRating};

/// Rating change per game scales with this.
pub const K_FACTOR: f64 = 0.1;

/// Round to two decimal places, the precision ratings are stored at.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Logistic win expectation of a team rated `user_avg` against `opp_avg`, base 10.
pub fn expected_score(user_avg: f64, opp_avg: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf(opp_avg - user_avg))
}
