//! Normalization of raw prescription documents into the canonical form.
//!
//! The generation service returns one of three incompatible shapes
//! (force/exercise-list, endurance/block-list, competition/station-list).
//! This module reconciles them: the shape is detected once, the matching
//! converter derives a canonical `exercises` list, and normalized metadata
//! (discipline, focus) is attached. Variant-specific fields survive on the
//! output so session-type-aware consumers keep working.

use crate::convert::{competition_station_to_exercise, endurance_block_to_exercise};
use crate::detector::detect_shape;
use crate::discipline::deduce_discipline;
use crate::{CanonicalPrescription, PrescriptionShape};
use serde_json::Value;

/// Normalize a raw prescription document.
///
/// Never fails: a document matching none of the known shapes (or one whose
/// matched shape cannot be decoded) produces an empty-exercises canonical
/// prescription and a diagnostic log, so downstream consumers can render a
/// dedicated error state instead of crashing.
pub fn normalize_prescription(raw: &Value) -> CanonicalPrescription {
    let shape = detect_shape(raw);

    let mut prescription: CanonicalPrescription = match serde_json::from_value(raw.clone()) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("Failed to decode {:?}-shaped prescription: {}", shape, e);
            return CanonicalPrescription {
                shape,
                ..Default::default()
            };
        }
    };
    prescription.shape = shape;

    match shape {
        PrescriptionShape::Competition => {
            let stations = prescription.stations.as_deref().unwrap_or_default();
            let station_count = stations.len();
            prescription.exercises = stations.iter().map(competition_station_to_exercise).collect();
            apply_focus_union(&mut prescription);

            tracing::info!(
                "Competition prescription normalized: {} stations -> {} exercises (format: {:?})",
                station_count,
                prescription.exercises.len(),
                prescription.competition_format
            );
        }

        PrescriptionShape::Endurance => {
            let blocks = prescription.main_workout.as_deref().unwrap_or_default();
            prescription.exercises = blocks.iter().map(endurance_block_to_exercise).collect();
            apply_focus_union(&mut prescription);

            if prescription.discipline.is_none() {
                let deduced = deduce_discipline(&prescription);
                tracing::warn!(
                    "Discipline missing on endurance prescription, using deduced value '{}'",
                    deduced
                );
                prescription.discipline = Some(deduced);
            }

            tracing::info!(
                "Endurance prescription normalized: {} blocks, discipline {:?}",
                prescription.main_workout.as_ref().map_or(0, Vec::len),
                prescription.discipline
            );
        }

        PrescriptionShape::Force => {
            // Already in canonical layout; pass through unchanged
            tracing::info!(
                "Force prescription already normalized: {} exercises",
                prescription.exercises.len()
            );
        }

        PrescriptionShape::Unknown => {
            tracing::warn!(
                "Prescription missing exercises, mainWorkout and stations; keys: {:?}",
                raw.as_object()
                    .map(|o| o.keys().cloned().collect::<Vec<_>>())
                    .unwrap_or_default()
            );
            prescription.exercises = Vec::new();
        }
    }

    prescription
}

/// Union `focus` from `focusZones`/`focus`, preferring `focusZones`
fn apply_focus_union(prescription: &mut CanonicalPrescription) {
    if let Some(zones) = prescription.focus_zones.clone() {
        prescription.focus = zones;
    }
}

/// Count of displayable workout items: main blocks when present, else the
/// canonical exercise list
pub fn workout_items_count(prescription: &CanonicalPrescription) -> usize {
    match prescription.main_workout.as_deref() {
        Some(blocks) if !blocks.is_empty() => blocks.len(),
        _ => prescription.exercises.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalizes_endurance_document() {
        let raw = json!({
            "sessionName": "Endurance fondamentale",
            "mainWorkout": [
                { "id": "w1", "name": "Steady", "duration": 20, "targetZone": "Z2" }
            ],
            "durationTarget": 20
        });

        let prescription = normalize_prescription(&raw);
        assert_eq!(prescription.shape, PrescriptionShape::Endurance);
        assert_eq!(prescription.exercises.len(), 1);

        let exercise = &prescription.exercises[0];
        assert_eq!(exercise.id, "w1");
        assert_eq!(exercise.sets, 1);
        assert_eq!(exercise.reps, 20.0);
        assert_eq!(exercise.rest, 120.0);

        // Original blocks are preserved alongside the canonical view
        assert_eq!(prescription.main_workout.as_ref().unwrap().len(), 1);
        assert_eq!(prescription.discipline.as_deref(), Some("cardio"));
    }

    #[test]
    fn test_normalizes_competition_document() {
        let raw = json!({
            "stations": [
                { "id": "s1", "name": "Ski Erg", "distance": 1000, "transitionTime": 60 },
                { "id": "s2", "name": "Sled Push", "targetReps": 4 }
            ],
            "competitionFormat": "hyrox"
        });

        let prescription = normalize_prescription(&raw);
        assert_eq!(prescription.shape, PrescriptionShape::Competition);
        assert_eq!(prescription.exercises.len(), 2);
        assert_eq!(prescription.exercises[0].reps, 1000.0);
        assert_eq!(prescription.exercises[1].reps, 4.0);
        assert_eq!(prescription.competition_format.as_deref(), Some("hyrox"));
        assert!(prescription.stations.is_some());
    }

    #[test]
    fn test_force_document_passes_through() {
        let raw = json!({
            "exercises": [
                { "id": "e1", "name": "Back Squat", "sets": 5, "reps": 5, "rest": 180 }
            ],
            "focus": ["legs"]
        });

        let prescription = normalize_prescription(&raw);
        assert_eq!(prescription.shape, PrescriptionShape::Force);
        assert_eq!(prescription.exercises.len(), 1);
        assert_eq!(prescription.exercises[0].name, "Back Squat");
        assert_eq!(prescription.focus, vec!["legs".to_string()]);
    }

    #[test]
    fn test_unknown_shape_yields_empty_exercises() {
        let raw = json!({ "sessionName": "mystery", "payload": 42 });

        let prescription = normalize_prescription(&raw);
        assert_eq!(prescription.shape, PrescriptionShape::Unknown);
        assert!(prescription.exercises.is_empty());
        assert_eq!(prescription.session_name.as_deref(), Some("mystery"));
    }

    #[test]
    fn test_focus_zones_win_over_focus() {
        let raw = json!({
            "mainWorkout": [],
            "focusZones": ["Z2", "Z3"],
            "focus": ["old"]
        });

        let prescription = normalize_prescription(&raw);
        assert_eq!(prescription.focus, vec!["Z2".to_string(), "Z3".to_string()]);
        // focusZones preserved for consumers that read it directly
        assert_eq!(
            prescription.focus_zones,
            Some(vec!["Z2".to_string(), "Z3".to_string()])
        );
    }

    #[test]
    fn test_explicit_discipline_is_kept_verbatim() {
        let raw = json!({
            "mainWorkout": [],
            "discipline": "trail",
            "sessionName": "Easy run"
        });

        let prescription = normalize_prescription(&raw);
        assert_eq!(prescription.discipline.as_deref(), Some("trail"));
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let raw = json!({
            "sessionName": "Tempo vélo",
            "mainWorkout": [
                { "id": "w1", "name": "Tempo", "duration": 30, "targetZone": "Z3" }
            ]
        });

        let once = normalize_prescription(&raw);
        let twice = normalize_prescription(&serde_json::to_value(&once).unwrap());

        assert_eq!(once.exercises, twice.exercises);
        assert_eq!(once.shape, twice.shape);
        assert_eq!(once.discipline, twice.discipline);
    }

    #[test]
    fn test_workout_items_count_prefers_main_workout() {
        let raw = json!({
            "mainWorkout": [
                { "id": "w1", "duration": 10 },
                { "id": "w2", "duration": 10 }
            ]
        });
        let prescription = normalize_prescription(&raw);
        assert_eq!(workout_items_count(&prescription), 2);

        let force = normalize_prescription(&json!({
            "exercises": [{ "id": "e1" }, { "id": "e2" }, { "id": "e3" }]
        }));
        assert_eq!(workout_items_count(&force), 3);
    }

    #[test]
    fn test_malformed_blocks_fall_back_to_empty() {
        // mainWorkout is an array but a block has a non-decodable payload
        let raw = json!({
            "sessionName": "bad",
            "mainWorkout": [{ "id": "w1", "duration": "soon" }]
        });

        let prescription = normalize_prescription(&raw);
        assert_eq!(prescription.shape, PrescriptionShape::Endurance);
        assert!(prescription.exercises.is_empty());
    }
}
