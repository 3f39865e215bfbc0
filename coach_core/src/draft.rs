//! Prescription draft persistence with file locking.
//!
//! The draft is the one session prescription currently being worked on:
//! generated, adjusted zero or more times, then completed or discarded.
//! It is replaced wholesale on every transition, persisted atomically,
//! and read leniently (a corrupt file degrades to an empty draft).

use crate::{CanonicalPrescription, Error, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// The current working prescription, if any
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionDraft {
    pub prescription: Option<CanonicalPrescription>,

    pub session_id: Option<String>,

    /// Times the draft has been adjusted since generation
    pub adjustment_count: u32,

    pub updated_at: Option<DateTime<Utc>>,
}

impl PrescriptionDraft {
    /// Replace the draft with a freshly generated prescription
    pub fn set_prescription(&mut self, prescription: CanonicalPrescription, session_id: &str) {
        self.prescription = Some(prescription);
        self.session_id = Some(session_id.to_string());
        self.adjustment_count = 0;
        self.updated_at = Some(Utc::now());
    }

    /// Replace the draft with an adjusted prescription
    pub fn record_adjustment(&mut self, prescription: CanonicalPrescription) {
        self.prescription = Some(prescription);
        self.adjustment_count += 1;
        self.updated_at = Some(Utc::now());
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Load the draft from a file with shared locking
    ///
    /// Returns an empty draft if the file doesn't exist.
    /// If the file is corrupted, logs a warning and returns an empty draft.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No draft file found, starting empty");
            return Ok(Self::default());
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(
                    "Unable to open draft file {:?}: {}. Starting empty.",
                    path,
                    e
                );
                return Ok(Self::default());
            }
        };

        // Acquire shared lock for reading
        if let Err(e) = file.lock_shared() {
            tracing::warn!(
                "Unable to lock draft file {:?}: {}. Starting empty.",
                path,
                e
            );
            return Ok(Self::default());
        }

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        if let Err(e) = reader.read_to_string(&mut contents) {
            let _ = file.unlock();
            tracing::warn!(
                "Failed to read draft file {:?}: {}. Starting empty.",
                path,
                e
            );
            return Ok(Self::default());
        }

        file.unlock()?;

        match serde_json::from_str::<PrescriptionDraft>(&contents) {
            Ok(draft) => {
                tracing::debug!("Loaded draft from {:?}", path);
                Ok(draft)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to parse draft file {:?}: {}. Starting empty.",
                    path,
                    e
                );
                Ok(Self::default())
            }
        }
    }

    /// Save the draft to a file with exclusive locking
    ///
    /// Atomically writes by:
    /// 1. Writing to a temp file
    /// 2. Syncing to disk
    /// 3. Renaming over the original
    pub fn save(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Create unique temp file in the same directory for atomic rename
        let temp = NamedTempFile::new_in(path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "draft path missing parent")
        })?)?;

        // Acquire exclusive lock on the temp file to serialize concurrent writers
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(self)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        // Atomically replace old draft file
        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved draft to {:?}", path);
        Ok(())
    }

    /// Load the draft, modify it, and save it back atomically
    pub fn update<F>(path: &Path, f: F) -> Result<Self>
    where
        F: FnOnce(&mut PrescriptionDraft) -> Result<()>,
    {
        let mut draft = Self::load(path)?;
        f(&mut draft)?;
        draft.save(path)?;
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize_prescription;
    use serde_json::json;

    fn sample_prescription() -> CanonicalPrescription {
        normalize_prescription(&json!({
            "sessionName": "Footing Z2",
            "mainWorkout": [
                { "id": "w1", "name": "Steady", "duration": 40, "targetZone": "Z2" }
            ]
        }))
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let draft_path = temp_dir.path().join("draft.json");

        let mut draft = PrescriptionDraft::default();
        draft.set_prescription(sample_prescription(), "s1");
        draft.save(&draft_path).unwrap();

        let loaded = PrescriptionDraft::load(&draft_path).unwrap();
        assert_eq!(loaded.session_id.as_deref(), Some("s1"));
        assert_eq!(loaded.adjustment_count, 0);
        assert_eq!(
            loaded
                .prescription
                .as_ref()
                .unwrap()
                .session_name
                .as_deref(),
            Some("Footing Z2")
        );
    }

    #[test]
    fn test_load_nonexistent_returns_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let draft_path = temp_dir.path().join("nonexistent.json");

        let draft = PrescriptionDraft::load(&draft_path).unwrap();
        assert!(draft.prescription.is_none());
        assert_eq!(draft.adjustment_count, 0);
    }

    #[test]
    fn test_corrupted_draft_returns_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let draft_path = temp_dir.path().join("corrupted.json");

        std::fs::write(&draft_path, "{ invalid json }").unwrap();

        let draft = PrescriptionDraft::load(&draft_path).unwrap();
        assert!(draft.prescription.is_none());
    }

    #[test]
    fn test_adjustment_replaces_and_counts() {
        let mut draft = PrescriptionDraft::default();
        draft.set_prescription(sample_prescription(), "s1");

        let mut adjusted = sample_prescription();
        adjusted.duration_target = Some(46.0);
        draft.record_adjustment(adjusted);
        draft.record_adjustment(sample_prescription());

        assert_eq!(draft.adjustment_count, 2);
        assert_eq!(draft.session_id.as_deref(), Some("s1"));
    }

    #[test]
    fn test_update_pattern() {
        let temp_dir = tempfile::tempdir().unwrap();
        let draft_path = temp_dir.path().join("draft.json");

        PrescriptionDraft::default().save(&draft_path).unwrap();

        PrescriptionDraft::update(&draft_path, |draft| {
            draft.set_prescription(sample_prescription(), "s9");
            Ok(())
        })
        .unwrap();

        let loaded = PrescriptionDraft::load(&draft_path).unwrap();
        assert_eq!(loaded.session_id.as_deref(), Some("s9"));
    }

    #[test]
    fn test_atomic_save_leaves_no_stray_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let draft_path = temp_dir.path().join("draft.json");

        PrescriptionDraft::default().save(&draft_path).unwrap();

        assert!(draft_path.exists());
        let extras: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "draft.json")
            .collect();
        assert!(
            extras.is_empty(),
            "Expected only draft.json, found extras: {:?}",
            extras
        );
    }
}
