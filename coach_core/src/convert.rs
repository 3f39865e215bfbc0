//! Converters from endurance blocks and competition stations to the
//! canonical exercise unit.
//!
//! Both mappings are lossy by design: endurance has no true sets/reps
//! concept and a station is richer than an exercise. They exist solely so
//! generic exercise-rendering code can display every session type without
//! a parallel code path. Source ids are preserved verbatim so keying and
//! scroll-to-element features keep working across normalization.

use crate::{EnduranceBlock, Exercise, Station};

/// Fraction of a block's duration synthesized as rest, in seconds
const ENDURANCE_REST_RATIO: f64 = 0.1;

/// Derive a canonical exercise from an endurance block.
///
/// - `reps`: interval work duration when present, else the block's own
///   duration (minutes-as-reps placeholder)
/// - `rest`: interval rest duration when present, else
///   `round(duration * 0.1 * 60)` seconds
/// - `sets`: interval repeats, else 1
pub fn endurance_block_to_exercise(block: &EnduranceBlock) -> Exercise {
    let duration_minutes = block.duration;
    let synthesized_rest = (duration_minutes * ENDURANCE_REST_RATIO * 60.0).round();

    Exercise {
        id: block.id.clone(),
        name: block.name.clone(),
        variant: block.block_type.clone(),
        sets: block.intervals.as_ref().map_or(1, |i| i.repeats),
        reps: block
            .intervals
            .as_ref()
            .map_or(duration_minutes, |i| i.work.duration),
        rest: block
            .intervals
            .as_ref()
            .map_or(synthesized_rest, |i| i.rest.duration),
        rpe_target: block.rpe_target,
        coach_notes: block.coach_notes.clone().or_else(|| block.description.clone()),
        coach_tips: block.cues.clone(),
        safety_notes: Vec::new(),
        common_mistakes: Vec::new(),
        ..Default::default()
    }
}

/// Derive a canonical exercise from a competition station.
///
/// Stations always render as a single set; competition-only fields
/// (`distance`, `target_time`, `station_type`, nested `exercises`) ride
/// along unchanged for consumers that need the richer station model.
pub fn competition_station_to_exercise(station: &Station) -> Exercise {
    tracing::debug!(
        "Converting competition station '{}' ({}) to exercise",
        station.name,
        station.id
    );

    Exercise {
        id: station.id.clone(),
        name: station.name.clone(),
        variant: station
            .station_type
            .clone()
            .or_else(|| Some("competition".into())),
        sets: 1,
        reps: station.target_reps.or(station.distance).unwrap_or(0.0),
        rest: station.transition_time.unwrap_or(0.0),
        rpe_target: station.rpe_target,
        coach_notes: station
            .coach_notes
            .clone()
            .or_else(|| station.description.clone())
            .or_else(|| Some(String::new())),
        coach_tips: if station.cues.is_empty() {
            station.tips.clone()
        } else {
            station.cues.clone()
        },
        safety_notes: station.safety_notes.clone(),
        common_mistakes: station.common_mistakes.clone(),
        distance: station.distance,
        target_time: station.target_time.clone(),
        station_type: station.station_type.clone(),
        exercises: station.exercises.clone(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn steady_block() -> EnduranceBlock {
        serde_json::from_value(json!({
            "id": "b1",
            "name": "Tempo",
            "type": "steady",
            "duration": 30,
            "targetZone": "Z3"
        }))
        .unwrap()
    }

    #[test]
    fn test_steady_block_synthesizes_rest() {
        let exercise = endurance_block_to_exercise(&steady_block());

        assert_eq!(exercise.id, "b1");
        assert_eq!(exercise.name, "Tempo");
        assert_eq!(exercise.variant.as_deref(), Some("steady"));
        assert_eq!(exercise.sets, 1);
        assert_eq!(exercise.reps, 30.0);
        // rest = round(30 * 0.1 * 60) = 180
        assert_eq!(exercise.rest, 180.0);
    }

    #[test]
    fn test_interval_block_uses_interval_fields() {
        let block: EnduranceBlock = serde_json::from_value(json!({
            "id": "b2",
            "name": "VO2 Intervals",
            "type": "intervals",
            "duration": 24,
            "targetZone": "Z4",
            "intervals": {
                "work": { "duration": 4 },
                "rest": { "duration": 2 },
                "repeats": 5
            }
        }))
        .unwrap();

        let exercise = endurance_block_to_exercise(&block);
        assert_eq!(exercise.sets, 5);
        assert_eq!(exercise.reps, 4.0);
        assert_eq!(exercise.rest, 2.0);
    }

    #[test]
    fn test_block_description_falls_back_to_coach_notes() {
        let mut block = steady_block();
        block.description = Some("steady effort".into());
        block.coach_notes = None;

        let exercise = endurance_block_to_exercise(&block);
        assert_eq!(exercise.coach_notes.as_deref(), Some("steady effort"));
    }

    #[test]
    fn test_station_reps_prefers_target_reps() {
        let station: Station = serde_json::from_value(json!({
            "id": "s1",
            "name": "Sled Push",
            "stationType": "power",
            "targetReps": 12,
            "distance": 50,
            "transitionTime": 45
        }))
        .unwrap();

        let exercise = competition_station_to_exercise(&station);
        assert_eq!(exercise.id, "s1");
        assert_eq!(exercise.sets, 1);
        assert_eq!(exercise.reps, 12.0);
        assert_eq!(exercise.rest, 45.0);
        assert_eq!(exercise.station_type.as_deref(), Some("power"));
    }

    #[test]
    fn test_station_reps_falls_back_to_distance_then_zero() {
        let station: Station = serde_json::from_value(json!({
            "id": "s2",
            "name": "Run",
            "distance": 1000
        }))
        .unwrap();
        assert_eq!(competition_station_to_exercise(&station).reps, 1000.0);

        let bare: Station = serde_json::from_value(json!({
            "id": "s3",
            "name": "Hold"
        }))
        .unwrap();
        let exercise = competition_station_to_exercise(&bare);
        assert_eq!(exercise.reps, 0.0);
        assert_eq!(exercise.rest, 0.0);
        assert_eq!(exercise.variant.as_deref(), Some("competition"));
    }

    #[test]
    fn test_station_nested_exercises_pass_through() {
        let station: Station = serde_json::from_value(json!({
            "id": "s4",
            "name": "Combo",
            "exercises": [{ "name": "Burpee" }, { "name": "Row" }],
            "targetTime": "2:30"
        }))
        .unwrap();

        let exercise = competition_station_to_exercise(&station);
        assert_eq!(
            exercise.exercises,
            Some(json!([{ "name": "Burpee" }, { "name": "Row" }]))
        );
        assert_eq!(exercise.target_time, Some(json!("2:30")));
    }
}
