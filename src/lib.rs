//! # Courtside
//!
//! Match results and ratings for a recreational doubles matchmaking platform.
//!
//! ## Architecture
//!
//! - **models**: Players, matches, games, result drafts and ledger entries
//! - **rating**: Elo-style rating engine and join-rating resolution
//! - **ledger**: Per-player rating history writes
//! - **platform**: Match lifecycle, result confirmation, admin and repair operations
//! - **storage**: JSONL snapshot persistence
//! - **api**: REST API endpoints
//! - **config**: Configuration loading and validation

pub mod api;
pub mod config;
pub mod ledger;
pub mod models;
pub mod platform;
pub mod rating;
pub mod storage;

pub use models::*;
