//! Fold a provider's label vocabulary into a single fakeness probability.
//!
//! Classifiers disagree on naming (`"Fake"`, `"LABEL_1"`, `"artificial"`,
//! `"real"`, …), so labels are matched by case-insensitive substring against
//! two keyword sets. Providers sort predictions by descending confidence, so
//! the first match is taken as authoritative.

use crate::classifier::Prediction;
use serde::Serialize;

const FAKE_KEYWORDS: [&str; 4] = ["fake", "label_1", "synthetic", "generated"];
const REAL_KEYWORDS: [&str; 3] = ["real", "label_0", "authentic"];

fn label_matches(label: &str, keywords: &[&str]) -> bool {
    let lowered = label.to_lowercase();
    keywords.iter().any(|k| lowered.contains(k))
}

/// Probability in `[0, 1]` that the content is fake.
///
/// The first FAKE-vocabulary prediction wins outright; failing that the first
/// REAL-vocabulary prediction is inverted; with neither (or an empty list)
/// the content is treated as authentic.
///
/// ```
/// use verisight_forensics::{normalize, Prediction};
///
/// let preds = vec![Prediction::new("Real", 0.25), Prediction::new("Fake", 0.75)];
/// assert_eq!(normalize(&preds), 0.75);
/// assert_eq!(normalize(&[Prediction::new("neutral", 0.99)]), 0.0);
/// ```
pub fn normalize(predictions: &[Prediction]) -> f64 {
    predictions
        .iter()
        .find(|p| label_matches(&p.label, &FAKE_KEYWORDS))
        .map(|p| p.score)
        .or_else(|| {
            predictions
                .iter()
                .find(|p| label_matches(&p.label, &REAL_KEYWORDS))
                .map(|p| 1.0 - p.score)
        })
        .unwrap_or(0.0)
}

/// Derived verdict for one analysed image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FakenessAssessment {
    pub fakeness: f64,
    /// `round((1 - fakeness) * 100)`
    pub integrity: u8,
    /// Strictly greater than one half.
    pub tampered: bool,
}

impl FakenessAssessment {
    pub fn from_fakeness(fakeness: f64) -> Self {
        let fakeness = if fakeness.is_finite() {
            fakeness.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            fakeness,
            integrity: ((1.0 - fakeness) * 100.0).round() as u8,
            tampered: fakeness > 0.5,
        }
    }
}

pub fn assess(predictions: &[Prediction]) -> FakenessAssessment {
    FakenessAssessment::from_fakeness(normalize(predictions))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(label: &str, score: f64) -> Prediction {
        Prediction::new(label, score)
    }

    #[test]
    fn first_fake_match_wins_even_after_real() {
        let preds = [p("real", 0.6), p("LABEL_1", 0.4), p("synthetic", 0.9)];
        assert_eq!(normalize(&preds), 0.4);
    }

    #[test]
    fn fake_before_real_uses_fake_score() {
        let preds = [p("Fake", 0.83), p("Real", 0.17)];
        assert_eq!(normalize(&preds), 0.83);
    }

    #[test]
    fn real_only_inverts_first_real_score() {
        let preds = [p("human", 0.5), p("Authentic", 0.9), p("real", 0.1)];
        assert!((normalize(&preds) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn label_zero_counts_as_real() {
        let preds = [p("LABEL_0", 0.75)];
        assert!((normalize(&preds) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn empty_and_unknown_vocabularies_are_authentic() {
        assert_eq!(normalize(&[]), 0.0);
        let a = assess(&[p("neutral", 0.97)]);
        assert_eq!(a.fakeness, 0.0);
        assert_eq!(a.integrity, 100);
        assert!(!a.tampered);
    }

    #[test]
    fn generated_is_fake_vocabulary() {
        assert_eq!(normalize(&[p("ai-generated", 0.66)]), 0.66);
    }

    #[test]
    fn integrity_rounds_and_threshold_is_strict() {
        let half = FakenessAssessment::from_fakeness(0.5);
        assert_eq!(half.integrity, 50);
        assert!(!half.tampered);

        let just_over = FakenessAssessment::from_fakeness(0.501);
        assert!(just_over.tampered);
        assert_eq!(just_over.integrity, 50);

        assert_eq!(FakenessAssessment::from_fakeness(0.123).integrity, 88);
        assert_eq!(FakenessAssessment::from_fakeness(0.126).integrity, 87);
        assert_eq!(FakenessAssessment::from_fakeness(1.0).integrity, 0);
        assert_eq!(FakenessAssessment::from_fakeness(0.0).integrity, 100);
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        assert_eq!(FakenessAssessment::from_fakeness(1.7).integrity, 0);
        assert_eq!(FakenessAssessment::from_fakeness(-0.2).integrity, 100);
        assert_eq!(FakenessAssessment::from_fakeness(f64::NAN).fakeness, 0.0);
    }
}
