#![forbid(unsafe_code)]

//! Core domain model and business logic for the Coach prescription system.
//!
//! This crate provides:
//! - Domain types (prescriptions, blocks, stations, exercises)
//! - Shape detection and normalization into the canonical form
//! - Endurance intensity adjustment
//! - Generation coordination (locks, illustration cache, orchestration)
//! - Persistence (draft, journal)

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod detector;
pub mod convert;
pub mod discipline;
pub mod normalizer;
pub mod adjustment;
pub mod lock;
pub mod cache;
pub mod guard;
pub mod generation;
pub mod draft;
pub mod journal;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::{BackoffPolicy, Config};
pub use detector::detect_shape;
pub use discipline::deduce_discipline;
pub use normalizer::{normalize_prescription, workout_items_count};
pub use adjustment::{adjust_endurance_intensity, AdjustmentDirection, AdjustmentResult};
pub use lock::{GenerationLockService, LockRequest};
pub use cache::{IllustrationCache, IllustrationResult};
pub use guard::{InitGuard, InitOutcome};
pub use generation::{GenerationBackend, GenerationOutcome, GenerationService};
pub use draft::PrescriptionDraft;
pub use journal::{JournalEntry, JournalSink, JsonlJournal};
