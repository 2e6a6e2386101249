//! CSV trade journal
//!
//! Append-only record of every executed trade. Journaling is an
//! informational side channel: a write failure is logged by the caller and
//! never rolls back or blocks the trade itself.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One executed trade, as written to the journal.
#[derive(Debug, Clone, Serialize)]
pub struct JournalRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub action: String,
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
    pub lots: f64,
    pub reason: String,
    pub ticket: u64,
}

pub struct TradeJournal {
    path: PathBuf,
}

impl TradeJournal {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Append one record, writing the header on first use.
    pub fn append(&self, record: &JournalRecord) -> Result<()> {
        let write_header = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open journal at {}", self.path.display()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        writer.serialize(record).context("Failed to write journal row")?;
        writer.flush().context("Failed to flush journal")?;
        Ok(())
    }
}
