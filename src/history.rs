use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::session::Session;

/// One line of `history.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub date: DateTime<Utc>,
    pub player: String,
    pub difficulty: String,
    pub status: String,
    pub score: u32,
    pub penalties: u32,
    pub duration_secs: u64,
    pub levels_cleared: usize,
}

impl HistoryRow {
    pub fn from_session(session: &Session, date: DateTime<Utc>) -> Self {
        Self {
            date,
            player: session.player_name.clone(),
            difficulty: session.difficulty.to_string(),
            status: session.status.to_string(),
            score: session.total_score,
            penalties: session.penalties,
            duration_secs: session.duration_secs(),
            levels_cleared: session.levels_cleared(),
        }
    }
}

/// Append-only CSV log of finished sessions.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn append(&self, row: &HistoryRow) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // If the log doesn't exist yet we need to emit a header
        let needs_header = !self.path.exists();
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(row)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_all(&self) -> Result<Vec<HistoryRow>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut rows = Vec::new();
        for row in reader.deserialize() {
            rows.push(row?);
        }
        Ok(rows)
    }
}
