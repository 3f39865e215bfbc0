//! Core domain types for the training prescription layer.
//!
//! This module defines the fundamental types used throughout the system:
//! - The canonical (shape-independent) session prescription
//! - Endurance blocks, intervals and competition stations
//! - The canonical exercise unit rendered by downstream consumers
//! - Completed-session records for the local journal
//!
//! Raw prescription documents arrive from the generation service as
//! loosely-shaped JSON; `serde_json::Value` is the boundary type and the
//! normalizer converts it into `CanonicalPrescription` exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// ============================================================================
// Shape Discriminant
// ============================================================================

/// Structural shape of a raw prescription document.
///
/// Computed once at the boundary by the detector; all downstream code
/// matches on this tag instead of re-probing JSON fields.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionShape {
    Competition,
    Endurance,
    Force,
    #[default]
    Unknown,
}

// ============================================================================
// Endurance Types
// ============================================================================

/// One phase (work or rest) of an interval set, duration in minutes
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct IntervalPhase {
    pub duration: f64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Interval structure attached to an endurance block
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Intervals {
    pub work: IntervalPhase,
    pub rest: IntervalPhase,
    pub repeats: u32,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A named segment of a cardio session with a duration and target zone
///
/// `target_zone` is a free-text string containing one `Z1`..`Z5` token;
/// any surrounding descriptive text is preserved across adjustments.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnduranceBlock {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    /// Block kind as emitted upstream (steady, intervals, tempo, ...)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub block_type: Option<String>,

    /// Duration in minutes
    #[serde(default)]
    pub duration: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_zone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intervals: Option<Intervals>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpe_target: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coach_notes: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cues: Vec<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// Competition Types
// ============================================================================

/// A named segment of a multi-discipline competition circuit
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_reps: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,

    /// Upstream emits either "mm:ss" strings or raw seconds here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_time: Option<Value>,

    /// Seconds between this station and the next
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_time: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpe_target: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coach_notes: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cues: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tips: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub safety_notes: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub common_mistakes: Vec<String>,

    /// Multi-exercise stations nest their own exercise list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exercises: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// Canonical Exercise
// ============================================================================

/// The canonical unit rendered by downstream consumers.
///
/// For endurance and competition sources this is a derived view: `sets`,
/// `reps` and `rest` are synthesized from block/station fields and are not
/// independently editable on those variants.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,

    #[serde(default)]
    pub sets: u32,

    #[serde(default)]
    pub reps: f64,

    #[serde(default)]
    pub rest: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpe_target: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coach_notes: Option<String>,

    #[serde(default)]
    pub coach_tips: Vec<String>,

    #[serde(default)]
    pub safety_notes: Vec<String>,

    #[serde(default)]
    pub common_mistakes: Vec<String>,

    // Competition-only fields, passed through unchanged for consumers
    // that need the richer station model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_time: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exercises: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// Canonical Prescription
// ============================================================================

/// The normalized, shape-independent session prescription.
///
/// `exercises` is always populated after normalization regardless of the
/// source shape. Variant-specific fields (`main_workout`, `stations`,
/// `competition_format`) are preserved alongside it so downstream code can
/// still branch on session type. Replaced wholesale on regeneration or
/// adjustment, never mutated field-by-field across that boundary.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalPrescription {
    /// Structural discriminant, computed once by the normalizer
    #[serde(default)]
    pub shape: PrescriptionShape,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discipline: Option<String>,

    /// Unioned from `focusZones`/`focus` during normalization
    #[serde(default)]
    pub focus: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_zones: Option<Vec<String>>,

    /// Planned total duration in minutes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_target: Option<f64>,

    #[serde(default)]
    pub exercises: Vec<Exercise>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warmup: Option<EnduranceBlock>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_workout: Option<Vec<EnduranceBlock>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown: Option<EnduranceBlock>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stations: Option<Vec<Station>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competition_format: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CanonicalPrescription {
    /// Total minutes of warmup + main blocks + cooldown
    pub fn computed_duration(&self) -> f64 {
        let mut total = 0.0;
        if let Some(ref warmup) = self.warmup {
            total += warmup.duration;
        }
        if let Some(ref blocks) = self.main_workout {
            total += blocks.iter().map(|b| b.duration).sum::<f64>();
        }
        if let Some(ref cooldown) = self.cooldown {
            total += cooldown.duration;
        }
        total
    }
}

// ============================================================================
// Completed Session Record
// ============================================================================

/// A completed training session, as appended to the local journal
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletedSession {
    pub id: Uuid,
    pub session_name: Option<String>,
    pub shape: PrescriptionShape,
    pub discipline: Option<String>,
    pub completed_at: DateTime<Utc>,
    pub duration_target: Option<f64>,
    pub exercise_count: usize,
    pub perceived_rpe: Option<u8>,
}
