//! Structural shape detection for raw prescription documents.
//!
//! Upstream generation is inconsistent about tagging documents with a
//! `type`/`category`, so detection is structural only: it looks at which
//! workout-list field is present and array-typed. Competition is checked
//! before endurance before force, so a document that pathologically
//! contains both `stations` and `mainWorkout` resolves as competition.

use crate::PrescriptionShape;
use serde_json::Value;

/// True iff `stations` is present and array-typed (length ignored)
pub fn is_competition_prescription(raw: &Value) -> bool {
    raw.get("stations").map_or(false, Value::is_array)
}

/// True iff `mainWorkout` is present and array-typed
pub fn is_endurance_prescription(raw: &Value) -> bool {
    raw.get("mainWorkout").map_or(false, Value::is_array)
}

/// True iff `exercises` is present and array-typed
pub fn is_force_prescription(raw: &Value) -> bool {
    raw.get("exercises").map_or(false, Value::is_array)
}

/// Classify a raw document into one of the three shapes, first match wins
pub fn detect_shape(raw: &Value) -> PrescriptionShape {
    if is_competition_prescription(raw) {
        PrescriptionShape::Competition
    } else if is_endurance_prescription(raw) {
        PrescriptionShape::Endurance
    } else if is_force_prescription(raw) {
        PrescriptionShape::Force
    } else {
        PrescriptionShape::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detects_competition() {
        let raw = json!({ "stations": [], "competitionFormat": "hyrox" });
        assert_eq!(detect_shape(&raw), PrescriptionShape::Competition);
    }

    #[test]
    fn test_detects_endurance() {
        let raw = json!({ "mainWorkout": [{ "id": "b1" }] });
        assert_eq!(detect_shape(&raw), PrescriptionShape::Endurance);
    }

    #[test]
    fn test_detects_force() {
        let raw = json!({ "exercises": [{ "id": "e1" }] });
        assert_eq!(detect_shape(&raw), PrescriptionShape::Force);
    }

    #[test]
    fn test_detects_unknown() {
        let raw = json!({ "sessionName": "???" });
        assert_eq!(detect_shape(&raw), PrescriptionShape::Unknown);
    }

    #[test]
    fn test_competition_wins_over_endurance() {
        // Documented ambiguity: both fields present resolves as competition
        let raw = json!({ "stations": [], "mainWorkout": [], "exercises": [] });
        assert_eq!(detect_shape(&raw), PrescriptionShape::Competition);
    }

    #[test]
    fn test_non_array_fields_do_not_match() {
        let raw = json!({ "stations": "oops", "mainWorkout": 3 });
        assert_eq!(detect_shape(&raw), PrescriptionShape::Unknown);
    }

    #[test]
    fn test_empty_array_still_matches() {
        let raw = json!({ "mainWorkout": [] });
        assert_eq!(detect_shape(&raw), PrescriptionShape::Endurance);
    }
}
