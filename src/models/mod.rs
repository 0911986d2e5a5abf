//! Core data models for the rating platform.

mod draft;
mod game;
mod ids;
mod ledger;
mod match_model;
mod player;

pub use draft::*;
pub use game::*;
pub use ids::*;
pub use ledger::*;
pub use match_model::*;
pub use player::*;
