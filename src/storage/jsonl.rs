//! JSONL (JSON Lines) snapshot files.
//!
//! One file per record type under `<data_dir>/state/`, one JSON object per
//! line. Files are rewritten whole after every mutation.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::{StorageConfig, StorageError};

/// Record types persisted as JSONL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    Player,
    Match,
    ResultDraft,
}

impl EntityType {
    pub fn filename(&self) -> &'static str {
        match self {
            EntityType::Player => "players.jsonl",
            EntityType::Match => "matches.jsonl",
            EntityType::ResultDraft => "drafts.jsonl",
        }
    }

    pub fn path(&self, config: &StorageConfig) -> PathBuf {
        config.state_dir().join(self.filename())
    }
}

/// JSONL file writer.
pub struct JsonlWriter<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: Serialize> JsonlWriter<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    pub fn for_entity(config: &StorageConfig, entity: EntityType) -> Self {
        Self::new(entity.path(config))
    }

    fn ensure_dir(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Write entities, replacing the entire file.
    ///
    /// Writes to a sibling temp file first and renames it into place, so a
    /// reader never sees a half-written snapshot.
    pub fn write_all<'a, I>(&self, entities: I) -> Result<usize, StorageError>
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        self.ensure_dir()?;

        let tmp = self.path.with_extension("jsonl.tmp");
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        let mut count = 0;

        for entity in entities {
            let json = serde_json::to_string(entity)?;
            writeln!(writer, "{}", json)?;
            count += 1;
        }

        writer.flush()?;
        drop(writer);
        fs::rename(&tmp, &self.path)?;

        debug!("Wrote {} records to {:?}", count, self.path);
        Ok(count)
    }
}

/// JSONL file reader.
pub struct JsonlReader<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonlReader<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    pub fn for_entity(config: &StorageConfig, entity: EntityType) -> Self {
        Self::new(entity.path(config))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read every record. A missing file reads as empty.
    ///
    /// Unlike a log, a snapshot line that fails to parse is an error: skipping
    /// it would silently drop a player or match.
    pub fn read_all(&self) -> Result<Vec<T>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut entities = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entity = serde_json::from_str(&line).map_err(|source| StorageError::Corrupt {
                path: self.path.clone(),
                line: index + 1,
                source,
            })?;
            entities.push(entity);
        }

        debug!("Read {} records from {:?}", entities.len(), self.path);
        Ok(entities)
    }
}
