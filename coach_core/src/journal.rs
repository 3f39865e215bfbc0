//! Training journal: append-only JSONL history.
//!
//! Completed sessions and intensity adjustments are appended as JSON
//! lines with file locking for safe concurrent access. Reads are lenient:
//! an unparseable line is logged and skipped, never fatal.

use crate::adjustment::{AdjustmentChange, AdjustmentDirection};
use crate::{CompletedSession, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Audit record of one applied intensity adjustment
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentRecord {
    pub id: Uuid,
    pub session_name: Option<String>,
    pub direction: AdjustmentDirection,
    pub recorded_at: DateTime<Utc>,
    pub changes: Vec<AdjustmentChange>,
}

/// One journal line
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JournalEntry {
    Completion(CompletedSession),
    Adjustment(AdjustmentRecord),
}

/// Journal sink trait for persisting entries
pub trait JournalSink {
    fn append(&mut self, entry: &JournalEntry) -> Result<()>;
}

/// JSONL-based journal sink with file locking
pub struct JsonlJournal {
    path: PathBuf,
}

impl JsonlJournal {
    /// Create a new JSONL journal for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl JournalSink for JsonlJournal {
    fn append(&mut self, entry: &JournalEntry) -> Result<()> {
        self.ensure_parent_dir()?;

        // Open file for appending
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        // Acquire exclusive lock
        file.lock_exclusive()?;

        // Write entry as JSON line
        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(entry)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        file.unlock()?;

        tracing::debug!("Appended journal entry to {:?}", self.path);
        Ok(())
    }
}

/// Read all entries from a journal file
pub fn read_entries(path: &Path) -> Result<Vec<JournalEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    // Acquire shared lock for reading
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut entries = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<JournalEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!("Failed to parse journal line {}: {}", line_num + 1, e);
                // Continue reading, don't fail completely
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} journal entries", entries.len());
    Ok(entries)
}

/// Completed sessions only, in append order
pub fn read_completions(path: &Path) -> Result<Vec<CompletedSession>> {
    Ok(read_entries(path)?
        .into_iter()
        .filter_map(|entry| match entry {
            JournalEntry::Completion(session) => Some(session),
            JournalEntry::Adjustment(_) => None,
        })
        .collect())
}
