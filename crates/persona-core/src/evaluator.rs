//! Trait direction scoring: which of a trait's two prototype poles is the
//! subject closer to, and by how much.

use crate::embedding::{cosine, NormalizedEmbedding, VectorError};
use crate::traits::TraitLabels;
use serde::{Deserialize, Serialize};

const REPORT_DECIMALS: i32 = 3;

/// How two pole similarities are judged equal.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum EqualityPolicy {
    /// Bit-exact `==` on the two similarities.
    #[default]
    Exact,
    /// Similarities within `eps` of each other count as equal.
    Tolerance(f64),
}

impl EqualityPolicy {
    fn is_equal(self, a: f64, b: f64) -> bool {
        match self {
            EqualityPolicy::Exact => a == b,
            EqualityPolicy::Tolerance(eps) => (a - b).abs() <= eps,
        }
    }
}

/// Outcome of scoring one trait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitResult {
    pub label: String,
    /// |sim_high - sim_low| at full precision, in [0, 2].
    pub strength: f64,
}

impl TraitResult {
    /// Strength rounded to three decimals, for display only.
    pub fn rounded_strength(&self) -> f64 {
        round_to(self.strength, REPORT_DECIMALS)
    }
}

/// Round half to even, so 0.0625 reports as 0.062.
fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round_ties_even() / scale
}

/// Score a subject against one trait's poles with exact equality.
pub fn evaluate_trait(
    subject: &NormalizedEmbedding,
    pole_high: &NormalizedEmbedding,
    pole_low: &NormalizedEmbedding,
    labels: &TraitLabels,
) -> Result<TraitResult, VectorError> {
    evaluate_trait_with(subject, pole_high, pole_low, labels, EqualityPolicy::Exact)
}

/// Score a subject against one trait's poles.
///
/// `labels.greater` when the subject is more similar to `pole_high`,
/// `labels.equal` when the similarities are equal under `policy`,
/// `labels.less` otherwise (including NaN comparisons).
pub fn evaluate_trait_with(
    subject: &NormalizedEmbedding,
    pole_high: &NormalizedEmbedding,
    pole_low: &NormalizedEmbedding,
    labels: &TraitLabels,
    policy: EqualityPolicy,
) -> Result<TraitResult, VectorError> {
    let sim_high = cosine(subject, pole_high)?;
    let sim_low = cosine(subject, pole_low)?;

    // Equality is checked first so a tolerance can absorb a tiny lead.
    let label = if policy.is_equal(sim_high, sim_low) {
        &labels.equal
    } else if sim_high > sim_low {
        &labels.greater
    } else {
        &labels.less
    };

    Ok(TraitResult {
        label: label.clone(),
        strength: (sim_high - sim_low).abs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{normalize, Embedding};

    fn unit(values: &[f32]) -> NormalizedEmbedding {
        normalize(&Embedding::new(values.to_vec())).unwrap()
    }

    fn labels() -> TraitLabels {
        TraitLabels::new("More open", "Moderately open", "Less open")
    }

    #[test]
    fn test_tie_when_all_identical() {
        let v = unit(&[0.3, -0.2, 0.9]);
        let result = evaluate_trait(&v, &v, &v, &labels()).unwrap();
        assert_eq!(result.label, "Moderately open");
        assert_eq!(result.strength, 0.0);
    }

    #[test]
    fn test_strict_dominance() {
        let subject = unit(&[1.0, 0.0, 0.0]);
        let high = unit(&[1.0, 0.0, 0.0]);
        let low = unit(&[0.0, 1.0, 0.0]);
        let result = evaluate_trait(&subject, &high, &low, &labels()).unwrap();
        assert_eq!(result.label, "More open");
        assert!((result.strength - 1.0).abs() < 1e-6);
        assert_eq!(result.rounded_strength(), 1.0);
    }

    #[test]
    fn test_closer_to_low_pole() {
        let subject = unit(&[0.0, 1.0]);
        let high = unit(&[1.0, 0.0]);
        let low = unit(&[0.0, 1.0]);
        let result = evaluate_trait(&subject, &high, &low, &labels()).unwrap();
        assert_eq!(result.label, "Less open");
        assert!((result.strength - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_opposite_poles_give_max_strength() {
        let subject = unit(&[1.0, 0.0]);
        let high = unit(&[1.0, 0.0]);
        let low = unit(&[-1.0, 0.0]);
        let result = evaluate_trait(&subject, &high, &low, &labels()).unwrap();
        assert_eq!(result.label, "More open");
        assert!((result.strength - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_label_always_one_of_configured() {
        let l = labels();
        let vectors = [
            unit(&[1.0, 2.0, 3.0]),
            unit(&[-1.0, 0.5, 0.0]),
            unit(&[0.0, 0.0, 1.0]),
            unit(&[2.0, -2.0, 2.0]),
        ];
        for s in &vectors {
            for h in &vectors {
                for lo in &vectors {
                    let r = evaluate_trait(s, h, lo, &l).unwrap();
                    assert!(
                        r.label == l.greater || r.label == l.equal || r.label == l.less,
                        "unexpected label {}",
                        r.label
                    );
                    assert!((0.0..=2.0 + 1e-6).contains(&r.strength));
                }
            }
        }
    }

    #[test]
    fn test_exact_policy_near_tie_is_not_equal() {
        // sims 0.6 and 0.59999 differ by ~1e-5
        let subject = unit(&[1.0, 0.0]);
        let high = unit(&[0.6, 0.8]);
        let low = unit(&[0.59999, 0.800_007_5]);
        let exact = evaluate_trait(&subject, &high, &low, &labels()).unwrap();
        assert_ne!(exact.label, "Moderately open");

        let tolerant = evaluate_trait_with(
            &subject,
            &high,
            &low,
            &labels(),
            EqualityPolicy::Tolerance(1e-3),
        )
        .unwrap();
        assert_eq!(tolerant.label, "Moderately open");
        // strength keeps the real difference
        assert!(tolerant.strength > 0.0);
        assert_eq!(tolerant.rounded_strength(), 0.0);
    }

    #[test]
    fn test_exact_policy_resolves_double_precision_near_tie() {
        // sim_high = 1/sqrt(1 + 1e-8), sim_low = 1.0; equal if computed in f32
        let subject = unit(&[1.0, 0.0]);
        let high = unit(&[1.0, 1e-4]);
        let low = unit(&[1.0, 0.0]);
        let result = evaluate_trait(&subject, &high, &low, &labels()).unwrap();
        assert_eq!(result.label, "Less open");
        assert!(result.strength > 0.0);
        assert!((result.strength - 5e-9).abs() < 1e-10);
    }

    #[test]
    fn test_dimension_mismatch_propagates() {
        let subject = unit(&[1.0, 0.0, 0.0]);
        let high = unit(&[1.0, 0.0]);
        let low = unit(&[0.0, 1.0, 0.0]);
        let err = evaluate_trait(&subject, &high, &low, &labels()).unwrap_err();
        assert_eq!(
            err,
            VectorError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn test_rounded_strength_half_to_even() {
        let at = |strength: f64| TraitResult {
            label: "x".into(),
            strength,
        };
        assert_eq!(at(0.0625).rounded_strength(), 0.062);
        assert_eq!(at(0.0005).rounded_strength(), 0.0);
        assert_eq!(at(1.0).rounded_strength(), 1.0);
    }

    #[test]
    fn test_rounded_strength() {
        let r = TraitResult {
            label: "x".into(),
            strength: 0.707_106_77,
        };
        assert!((r.rounded_strength() - 0.707).abs() < 1e-6);
        assert!((r.strength - 0.707_106_77).abs() < 1e-9);
    }
}
