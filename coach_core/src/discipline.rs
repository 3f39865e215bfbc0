//! Discipline deduction for endurance sessions missing an explicit one.
//!
//! A heuristic, not a classifier: the session name and summary are
//! lowercased, concatenated and scanned for French/English keyword
//! substrings in fixed priority order. A text matching several categories
//! resolves to the first in the checked order (running > cycling >
//! swimming > triathlon); no match defaults to "cardio".

use crate::CanonicalPrescription;

const RUNNING_KEYWORDS: &[&str] = &["course", "run", "footing"];
const CYCLING_KEYWORDS: &[&str] = &["vélo", "cycl", "bike"];
const SWIMMING_KEYWORDS: &[&str] = &["natation", "piscine", "swim"];
const TRIATHLON_KEYWORDS: &[&str] = &["triathlon"];

const DEFAULT_DISCIPLINE: &str = "cardio";

/// Deduce a discipline from session name and summary text
pub fn deduce_discipline(prescription: &CanonicalPrescription) -> String {
    let session_name = prescription
        .session_name
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    let session_summary = prescription
        .session_summary
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    let combined = format!("{} {}", session_name, session_summary);

    let categories: &[(&str, &[&str])] = &[
        ("running", RUNNING_KEYWORDS),
        ("cycling", CYCLING_KEYWORDS),
        ("swimming", SWIMMING_KEYWORDS),
        ("triathlon", TRIATHLON_KEYWORDS),
    ];

    for (discipline, keywords) in categories {
        if keywords.iter().any(|kw| combined.contains(kw)) {
            return (*discipline).into();
        }
    }

    tracing::warn!(
        "Could not deduce discipline from '{}', defaulting to {}",
        combined.trim(),
        DEFAULT_DISCIPLINE
    );

    DEFAULT_DISCIPLINE.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prescription_with(name: &str, summary: &str) -> CanonicalPrescription {
        CanonicalPrescription {
            session_name: Some(name.into()),
            session_summary: Some(summary.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_running_keywords() {
        for text in ["Course à pied", "Easy Run", "Footing matinal"] {
            assert_eq!(deduce_discipline(&prescription_with(text, "")), "running");
        }
    }

    #[test]
    fn test_cycling_keywords() {
        for text in ["Sortie vélo", "Cycling base", "Bike intervals"] {
            assert_eq!(deduce_discipline(&prescription_with(text, "")), "cycling");
        }
    }

    #[test]
    fn test_swimming_keywords() {
        for text in ["Natation technique", "Séance piscine", "Swim drills"] {
            assert_eq!(deduce_discipline(&prescription_with(text, "")), "swimming");
        }
    }

    #[test]
    fn test_triathlon_keyword() {
        assert_eq!(
            deduce_discipline(&prescription_with("Prépa triathlon", "")),
            "triathlon"
        );
    }

    #[test]
    fn test_summary_is_scanned_too() {
        assert_eq!(
            deduce_discipline(&prescription_with("Séance Z2", "footing en aisance")),
            "running"
        );
    }

    #[test]
    fn test_priority_running_beats_cycling() {
        // Matching several categories resolves to the first in the order
        assert_eq!(
            deduce_discipline(&prescription_with("Brick: bike then run", "")),
            "running"
        );
    }

    #[test]
    fn test_defaults_to_cardio() {
        assert_eq!(
            deduce_discipline(&prescription_with("Séance Z2", "endurance fondamentale")),
            "cardio"
        );
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert_eq!(
            deduce_discipline(&prescription_with("LONG RUN", "")),
            "running"
        );
    }
}
