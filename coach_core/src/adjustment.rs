//! Intensity adjustment for endurance prescriptions.
//!
//! User-triggered "easier/harder" actions pass through here. Adjustment is
//! all-or-nothing: limits are checked before any mutation, and either a
//! fully adjusted prescription or the untouched original is returned,
//! never a partially-mutated hybrid. The whole computation is synchronous,
//! so it is atomic from the caller's perspective.

use crate::{CanonicalPrescription, EnduranceBlock};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use self::AdjustmentDirection::{Easier, Harder};

/// Percent change applied to non-interval block durations
pub const DURATION_ADJUSTMENT_PERCENT: f64 = 15.0;
/// Percent change applied to interval work durations
pub const INTERVAL_WORK_ADJUSTMENT_PERCENT: f64 = 20.0;
/// Percent change applied (inversely) to interval rest durations
pub const INTERVAL_REST_ADJUSTMENT_PERCENT: f64 = 25.0;

/// Interval repeats stay within this range
pub const MIN_INTERVAL_REPEATS: u32 = 1;
pub const MAX_INTERVAL_REPEATS: u32 = 12;

const MIN_BLOCK_DURATION_MINUTES: f64 = 1.0;
const MIN_REST_MINUTES: f64 = 0.5;

const ZONE_MIN: u8 = 1;
const ZONE_MAX: u8 = 5;

/// Direction of an intensity adjustment
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentDirection {
    Easier,
    Harder,
}

/// Audit record for one mutated field
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentChange {
    pub block_id: String,
    pub block_name: String,
    pub field: String,
    pub old_value: Value,
    pub new_value: Value,
}

/// Outcome of an adjustment request.
///
/// `limit_reached` is a first-class outcome, not a failure: it means the
/// prescription is already at the requested extreme and was returned
/// unchanged.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentResult {
    pub success: bool,
    pub adjusted_prescription: CanonicalPrescription,
    pub changes: Vec<AdjustmentChange>,
    pub message: String,
    pub limit_reached: bool,
}

/// Locate the `Z1`..`Z5` token within a zone string
fn find_zone_token(zone: &str) -> Option<(usize, u8)> {
    let bytes = zone.as_bytes();
    bytes
        .windows(2)
        .position(|w| w[0] == b'Z' && (b'1'..=b'5').contains(&w[1]))
        .map(|idx| (idx, bytes[idx + 1] - b'0'))
}

/// Step the zone token by one, clamped to [Z1, Z5]; everything else in the
/// string is preserved verbatim. Unparseable zones are returned unchanged.
fn adjust_zone(current_zone: &str, direction: AdjustmentDirection) -> String {
    let Some((idx, level)) = find_zone_token(current_zone) else {
        return current_zone.into();
    };

    let new_level = match direction {
        Harder => (level + 1).min(ZONE_MAX),
        Easier => level.saturating_sub(1).max(ZONE_MIN),
    };

    let mut adjusted = current_zone.to_string();
    adjusted.replace_range(idx..idx + 2, &format!("Z{}", new_level));
    adjusted
}

/// Scale a duration by the configured percentage, floored at one minute
fn adjust_duration(duration: f64, direction: AdjustmentDirection, is_work_interval: bool) -> f64 {
    let percent = if is_work_interval {
        INTERVAL_WORK_ADJUSTMENT_PERCENT
    } else {
        DURATION_ADJUSTMENT_PERCENT
    };
    let multiplier = match direction {
        Harder => 1.0 + percent / 100.0,
        Easier => 1.0 - percent / 100.0,
    };

    (duration * multiplier).round().max(MIN_BLOCK_DURATION_MINUTES)
}

/// Scale interval rest inversely (harder means less rest), floored at 30s
fn adjust_rest(rest_duration: f64, direction: AdjustmentDirection) -> f64 {
    let multiplier = match direction {
        Harder => 1.0 - INTERVAL_REST_ADJUSTMENT_PERCENT / 100.0,
        Easier => 1.0 + INTERVAL_REST_ADJUSTMENT_PERCENT / 100.0,
    };

    (rest_duration * multiplier).round().max(MIN_REST_MINUTES)
}

/// Step interval repeats by one, clamped
fn adjust_repeats(current_repeats: u32, direction: AdjustmentDirection) -> u32 {
    match direction {
        Harder => (current_repeats + 1).min(MAX_INTERVAL_REPEATS),
        Easier => current_repeats.saturating_sub(1).max(MIN_INTERVAL_REPEATS),
    }
}

/// Adjust one main-workout block, recording every field that changed
fn adjust_block(
    block: &EnduranceBlock,
    direction: AdjustmentDirection,
) -> (EnduranceBlock, Vec<AdjustmentChange>) {
    let mut changes = Vec::new();
    let mut adjusted = block.clone();

    let mut record = |field: &str, old: Value, new: Value, changes: &mut Vec<AdjustmentChange>| {
        changes.push(AdjustmentChange {
            block_id: block.id.clone(),
            block_name: block.name.clone(),
            field: field.into(),
            old_value: old,
            new_value: new,
        });
    };

    if let Some(ref old_zone) = block.target_zone {
        let new_zone = adjust_zone(old_zone, direction);
        if *old_zone != new_zone {
            record("targetZone", json!(old_zone), json!(new_zone), &mut changes);
            adjusted.target_zone = Some(new_zone);
        }
    }

    // Non-interval blocks carry their own duration
    if block.block_type.as_deref() != Some("intervals") && block.duration != 0.0 {
        let new_duration = adjust_duration(block.duration, direction, false);
        if new_duration != block.duration {
            record(
                "duration",
                json!(block.duration),
                json!(new_duration),
                &mut changes,
            );
            adjusted.duration = new_duration;
        }
    }

    if let Some(ref mut intervals) = adjusted.intervals {
        let new_work = adjust_duration(intervals.work.duration, direction, true);
        let new_rest = adjust_rest(intervals.rest.duration, direction);
        let new_repeats = adjust_repeats(intervals.repeats, direction);

        if new_work != intervals.work.duration {
            record(
                "intervals.work.duration",
                json!(intervals.work.duration),
                json!(new_work),
                &mut changes,
            );
        }
        if new_rest != intervals.rest.duration {
            record(
                "intervals.rest.duration",
                json!(intervals.rest.duration),
                json!(new_rest),
                &mut changes,
            );
        }
        if new_repeats != intervals.repeats {
            record(
                "intervals.repeats",
                json!(intervals.repeats),
                json!(new_repeats),
                &mut changes,
            );
        }

        intervals.work.duration = new_work;
        intervals.rest.duration = new_rest;
        intervals.repeats = new_repeats;

        // Interval blocks never carry an independent duration value
        adjusted.duration = ((new_work + new_rest) * f64::from(new_repeats)).round();
    }

    (adjusted, changes)
}

/// Pre-flight, read-only scan: true when any main block is already at the
/// requested extreme
fn limits_reached(prescription: &CanonicalPrescription, direction: AdjustmentDirection) -> bool {
    let Some(ref blocks) = prescription.main_workout else {
        return false;
    };

    for block in blocks {
        if let Some(ref zone) = block.target_zone {
            if let Some((_, level)) = find_zone_token(zone) {
                match direction {
                    Harder if level == ZONE_MAX => return true,
                    Easier if level == ZONE_MIN => return true,
                    _ => {}
                }
            }
        }

        if let Some(ref intervals) = block.intervals {
            match direction {
                Harder if intervals.repeats >= MAX_INTERVAL_REPEATS => return true,
                Easier if intervals.repeats <= MIN_INTERVAL_REPEATS => return true,
                _ => {}
            }
        }
    }

    false
}

fn failure(prescription: &CanonicalPrescription, message: &str) -> AdjustmentResult {
    AdjustmentResult {
        success: false,
        adjusted_prescription: prescription.clone(),
        changes: Vec::new(),
        message: message.into(),
        limit_reached: false,
    }
}

/// Adjust an endurance prescription one step easier or harder.
///
/// Only defined for endurance-shaped prescriptions (one with a
/// `main_workout`); other shapes are reported as a failure with the
/// original returned unchanged.
pub fn adjust_endurance_intensity(
    prescription: &CanonicalPrescription,
    direction: AdjustmentDirection,
) -> AdjustmentResult {
    tracing::info!(
        "Adjusting intensity {:?} for session {:?} ({} blocks)",
        direction,
        prescription.session_name,
        prescription.main_workout.as_ref().map_or(0, Vec::len)
    );

    if prescription.main_workout.is_none() {
        tracing::warn!("Intensity adjustment requested on a non-endurance prescription");
        return failure(prescription, "This session type cannot be adjusted.");
    }

    if limits_reached(prescription, direction) {
        tracing::warn!("Adjustment limit reached ({:?})", direction);
        return AdjustmentResult {
            success: false,
            adjusted_prescription: prescription.clone(),
            changes: Vec::new(),
            message: match direction {
                Harder => "You are already at maximum intensity!".into(),
                Easier => "You are already at the minimum recommended intensity.".into(),
            },
            limit_reached: true,
        };
    }

    let mut adjusted = prescription.clone();
    let mut all_changes = Vec::new();

    // Warmup and cooldown only shift zone, never duration
    if let Some(ref mut warmup) = adjusted.warmup {
        if let Some(ref old_zone) = warmup.target_zone {
            let new_zone = adjust_zone(old_zone, direction);
            if *old_zone != new_zone {
                all_changes.push(AdjustmentChange {
                    block_id: "warmup".into(),
                    block_name: "Warmup".into(),
                    field: "targetZone".into(),
                    old_value: json!(old_zone),
                    new_value: json!(new_zone),
                });
                warmup.target_zone = Some(new_zone);
            }
        }
    }

    if let Some(blocks) = adjusted.main_workout.take() {
        let mut adjusted_blocks = Vec::with_capacity(blocks.len());
        for block in &blocks {
            let (adjusted_block, changes) = adjust_block(block, direction);
            all_changes.extend(changes);
            adjusted_blocks.push(adjusted_block);
        }
        adjusted.main_workout = Some(adjusted_blocks);
    }

    if let Some(ref mut cooldown) = adjusted.cooldown {
        if let Some(ref old_zone) = cooldown.target_zone {
            let new_zone = adjust_zone(old_zone, direction);
            if *old_zone != new_zone {
                all_changes.push(AdjustmentChange {
                    block_id: "cooldown".into(),
                    block_name: "Cooldown".into(),
                    field: "targetZone".into(),
                    old_value: json!(old_zone),
                    new_value: json!(new_zone),
                });
                cooldown.target_zone = Some(new_zone);
            }
        }
    }

    let total_duration = adjusted.computed_duration();
    adjusted.duration_target = Some(total_duration);

    tracing::info!(
        "Adjustment completed: {} changes, new duration target {}",
        all_changes.len(),
        total_duration
    );

    AdjustmentResult {
        success: true,
        adjusted_prescription: adjusted,
        changes: all_changes,
        message: match direction {
            Harder => "Intensity increased. The session will be more demanding.".into(),
            Easier => "Intensity reduced. The session will be more accessible.".into(),
        },
        limit_reached: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn endurance_prescription(raw: serde_json::Value) -> CanonicalPrescription {
        crate::normalizer::normalize_prescription(&raw)
    }

    fn simple_session(zone: &str) -> CanonicalPrescription {
        endurance_prescription(json!({
            "sessionName": "Test",
            "mainWorkout": [
                { "id": "w1", "name": "Steady", "duration": 20, "targetZone": zone }
            ],
            "durationTarget": 20
        }))
    }

    #[test]
    fn test_zone_steps_up_and_preserves_text() {
        assert_eq!(adjust_zone("Z2 - comfortable pace", Harder), "Z3 - comfortable pace");
        assert_eq!(adjust_zone("tempo Z4", Easier), "tempo Z3");
    }

    #[test]
    fn test_zone_clamps_at_bounds() {
        assert_eq!(adjust_zone("Z5", Harder), "Z5");
        assert_eq!(adjust_zone("Z1", Easier), "Z1");
    }

    #[test]
    fn test_unparseable_zone_is_untouched() {
        assert_eq!(adjust_zone("threshold", Harder), "threshold");
        assert_eq!(adjust_zone("Z9", Harder), "Z9");
    }

    #[test]
    fn test_harder_at_z5_reports_limit_and_returns_input_unchanged() {
        let prescription = simple_session("Z5");
        let result = adjust_endurance_intensity(&prescription, Harder);

        assert!(!result.success);
        assert!(result.limit_reached);
        assert!(result.changes.is_empty());
        assert_eq!(result.adjusted_prescription, prescription);
    }

    #[test]
    fn test_easier_at_z1_reports_limit() {
        let result = adjust_endurance_intensity(&simple_session("Z1"), Easier);
        assert!(result.limit_reached);
    }

    #[test]
    fn test_repeated_harder_walks_zones_then_refuses() {
        let mut prescription = simple_session("Z2");

        for expected in ["Z3", "Z4", "Z5"] {
            let result = adjust_endurance_intensity(&prescription, Harder);
            assert!(result.success);
            prescription = result.adjusted_prescription;
            assert_eq!(
                prescription.main_workout.as_ref().unwrap()[0]
                    .target_zone
                    .as_deref(),
                Some(expected)
            );
        }

        let refused = adjust_endurance_intensity(&prescription, Harder);
        assert!(refused.limit_reached);
    }

    #[test]
    fn test_steady_duration_scales_by_fifteen_percent() {
        let result = adjust_endurance_intensity(&simple_session("Z2"), Harder);
        let block = &result.adjusted_prescription.main_workout.as_ref().unwrap()[0];
        // 20 * 1.15 = 23
        assert_eq!(block.duration, 23.0);

        let easier = adjust_endurance_intensity(&simple_session("Z3"), Easier);
        let block = &easier.adjusted_prescription.main_workout.as_ref().unwrap()[0];
        // 20 * 0.85 = 17
        assert_eq!(block.duration, 17.0);
    }

    #[test]
    fn test_interval_block_recompute() {
        let prescription = endurance_prescription(json!({
            "mainWorkout": [{
                "id": "i1",
                "name": "VO2",
                "type": "intervals",
                "duration": 30,
                "targetZone": "Z4",
                "intervals": {
                    "work": { "duration": 4 },
                    "rest": { "duration": 2 },
                    "repeats": 5
                }
            }]
        }));

        let result = adjust_endurance_intensity(&prescription, Harder);
        assert!(result.success);

        let block = &result.adjusted_prescription.main_workout.as_ref().unwrap()[0];
        let intervals = block.intervals.as_ref().unwrap();
        // work: round(4 * 1.2) = 5, rest: round(2 * 0.75) = 2, repeats: 6
        assert_eq!(intervals.work.duration, 5.0);
        assert_eq!(intervals.rest.duration, 2.0);
        assert_eq!(intervals.repeats, 6);
        // duration overridden by (work + rest) * repeats
        assert_eq!(block.duration, (5.0 + 2.0) * 6.0);
    }

    #[test]
    fn test_repeats_limit_blocks_whole_adjustment() {
        let prescription = endurance_prescription(json!({
            "mainWorkout": [
                { "id": "w1", "name": "Steady", "duration": 20, "targetZone": "Z2" },
                {
                    "id": "i1",
                    "name": "VO2",
                    "type": "intervals",
                    "targetZone": "Z4",
                    "intervals": {
                        "work": { "duration": 3 },
                        "rest": { "duration": 1 },
                        "repeats": 12
                    }
                }
            ]
        }));

        // All-or-nothing: the steady block could still be adjusted, but the
        // interval block is at its ceiling
        let result = adjust_endurance_intensity(&prescription, Harder);
        assert!(result.limit_reached);
        assert_eq!(result.adjusted_prescription, prescription);
    }

    #[test]
    fn test_warmup_and_cooldown_zones_shift_but_durations_do_not() {
        let prescription = endurance_prescription(json!({
            "warmup": { "id": "wu", "name": "Warmup", "duration": 10, "targetZone": "Z1 easy" },
            "mainWorkout": [
                { "id": "w1", "name": "Steady", "duration": 20, "targetZone": "Z2" }
            ],
            "cooldown": { "id": "cd", "name": "Cooldown", "duration": 5, "targetZone": "Z1" }
        }));

        let result = adjust_endurance_intensity(&prescription, Harder);
        assert!(result.success);

        let adjusted = &result.adjusted_prescription;
        assert_eq!(
            adjusted.warmup.as_ref().unwrap().target_zone.as_deref(),
            Some("Z2 easy")
        );
        assert_eq!(adjusted.warmup.as_ref().unwrap().duration, 10.0);
        assert_eq!(
            adjusted.cooldown.as_ref().unwrap().target_zone.as_deref(),
            Some("Z2")
        );
        assert_eq!(adjusted.cooldown.as_ref().unwrap().duration, 5.0);
    }

    #[test]
    fn test_duration_target_matches_component_sum() {
        let prescription = endurance_prescription(json!({
            "warmup": { "id": "wu", "name": "Warmup", "duration": 10, "targetZone": "Z1" },
            "mainWorkout": [
                { "id": "w1", "name": "Steady", "duration": 20, "targetZone": "Z2" },
                { "id": "w2", "name": "Tempo", "duration": 15, "targetZone": "Z3" }
            ],
            "cooldown": { "id": "cd", "name": "Cooldown", "duration": 5, "targetZone": "Z2" },
            "durationTarget": 50
        }));

        let result = adjust_endurance_intensity(&prescription, Harder);
        assert!(result.success);

        let adjusted = &result.adjusted_prescription;
        assert_eq!(
            adjusted.duration_target,
            Some(adjusted.computed_duration())
        );
    }

    #[test]
    fn test_changes_record_old_and_new_values() {
        let result = adjust_endurance_intensity(&simple_session("Z2"), Harder);

        let zone_change = result
            .changes
            .iter()
            .find(|c| c.field == "targetZone")
            .unwrap();
        assert_eq!(zone_change.block_id, "w1");
        assert_eq!(zone_change.old_value, json!("Z2"));
        assert_eq!(zone_change.new_value, json!("Z3"));

        let duration_change = result
            .changes
            .iter()
            .find(|c| c.field == "duration")
            .unwrap();
        assert_eq!(duration_change.old_value, json!(20.0));
        assert_eq!(duration_change.new_value, json!(23.0));
    }

    #[test]
    fn test_non_endurance_prescription_is_a_failure_not_a_panic() {
        let force = crate::normalizer::normalize_prescription(&json!({
            "exercises": [{ "id": "e1", "name": "Squat", "sets": 5, "reps": 5 }]
        }));

        let result = adjust_endurance_intensity(&force, Harder);
        assert!(!result.success);
        assert!(!result.limit_reached);
        assert_eq!(result.adjusted_prescription, force);
    }

    #[test]
    fn test_end_to_end_normalize_then_adjust() {
        let raw = json!({
            "mainWorkout": [
                { "id": "w1", "name": "Steady", "duration": 20, "targetZone": "Z2" }
            ],
            "durationTarget": 20
        });

        let canonical = crate::normalizer::normalize_prescription(&raw);
        assert_eq!(canonical.exercises[0].sets, 1);
        assert_eq!(canonical.exercises[0].reps, 20.0);
        assert_eq!(canonical.exercises[0].rest, 120.0);
        assert_eq!(canonical.discipline.as_deref(), Some("cardio"));

        let result = adjust_endurance_intensity(&canonical, Harder);
        assert!(result.success);

        let adjusted = &result.adjusted_prescription;
        let block = &adjusted.main_workout.as_ref().unwrap()[0];
        assert_eq!(block.target_zone.as_deref(), Some("Z3"));
        assert_eq!(block.duration, 23.0);
        assert_eq!(adjusted.duration_target, Some(23.0));
    }
}
