//! Filesystem persistence of the platform state.
//!
//! Layout under the data directory:
//! - `state/players.jsonl`
//! - `state/matches.jsonl`
//! - `state/drafts.jsonl`

pub mod jsonl;

pub use jsonl::{EntityType, JsonlReader, JsonlWriter};

use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::config::RulesConfig;
use crate::models::{Match, Player, ResultDraft};
use crate::platform::PlatformState;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupt record at {path:?} line {line}: {source}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
}

/// Configuration for storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join("state")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("./data"))
    }
}

/// Load the platform state. Missing files load as empty collections.
pub fn load_state(config: &StorageConfig, rules: RulesConfig) -> Result<PlatformState, StorageError> {
    let players: Vec<Player> = JsonlReader::for_entity(config, EntityType::Player).read_all()?;
    let matches: Vec<Match> = JsonlReader::for_entity(config, EntityType::Match).read_all()?;
    let drafts: Vec<ResultDraft> =
        JsonlReader::for_entity(config, EntityType::ResultDraft).read_all()?;

    info!(
        "Loaded {} players, {} matches, {} drafts from {:?}",
        players.len(),
        matches.len(),
        drafts.len(),
        config.state_dir()
    );
    Ok(PlatformState::from_records(rules, players, matches, drafts))
}

/// Persist the whole platform state.
///
/// Records are written sorted by id so snapshots diff cleanly.
pub fn save_state(config: &StorageConfig, state: &PlatformState) -> Result<(), StorageError> {
    let mut players: Vec<&Player> = state.players.values().collect();
    players.sort_by(|a, b| a.id.cmp(&b.id));
    let mut matches: Vec<&Match> = state.matches.values().collect();
    matches.sort_by(|a, b| a.id.cmp(&b.id));
    let mut drafts: Vec<&ResultDraft> = state.drafts.values().collect();
    drafts.sort_by(|a, b| a.id.cmp(&b.id));

    JsonlWriter::<Player>::for_entity(config, EntityType::Player).write_all(players)?;
    JsonlWriter::<Match>::for_entity(config, EntityType::Match).write_all(matches)?;
    JsonlWriter::<ResultDraft>::for_entity(config, EntityType::ResultDraft).write_all(drafts)?;
    Ok(())
}
