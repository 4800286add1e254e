//! Embedding vectors, L2 normalization and cosine similarity.
//!
//! Embeddings straight from a model carry arbitrary magnitude. Every
//! comparison in this crate goes through [`NormalizedEmbedding`], so cosine
//! similarity reduces to a plain dot product. Models emit `f32`; normalization
//! and comparison run in `f64` so near-ties resolve the same way a
//! double-precision reference does.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VectorError {
    #[error("degenerate embedding: zero-norm vector cannot be normalized")]
    DegenerateVector,
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Raw face embedding vector as returned by an embedding provider
/// (typically 512-dimensional for Facenet512 / ArcFace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model that produced this embedding (e.g., "Facenet512").
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    pub fn with_model(values: Vec<f32>, model: impl Into<String>) -> Self {
        Self {
            values,
            model_version: Some(model.into()),
        }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Euclidean (L2) norm, accumulated in `f64`.
    pub fn norm(&self) -> f64 {
        self.values
            .iter()
            .map(|&x| f64::from(x) * f64::from(x))
            .sum::<f64>()
            .sqrt()
    }
}

/// An embedding rescaled to unit Euclidean length.
///
/// Only constructible through [`normalize`], and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedEmbedding {
    values: Vec<f64>,
}

impl NormalizedEmbedding {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }
}

/// Scale `embedding` by 1/‖v‖₂.
///
/// Fails with [`VectorError::DegenerateVector`] when the norm is zero (or not
/// finite), instead of letting NaN leak into later comparisons.
pub fn normalize(embedding: &Embedding) -> Result<NormalizedEmbedding, VectorError> {
    let norm = embedding.norm();
    if norm == 0.0 || !norm.is_finite() {
        return Err(VectorError::DegenerateVector);
    }

    Ok(NormalizedEmbedding {
        values: embedding.values.iter().map(|&x| f64::from(x) / norm).collect(),
    })
}

/// Cosine similarity of two unit vectors, i.e. their dot product.
///
/// Returns a value in [-1, 1]. Higher = more similar. Vectors of different
/// length are rejected, never truncated.
pub fn cosine(a: &NormalizedEmbedding, b: &NormalizedEmbedding) -> Result<f64, VectorError> {
    if a.values.len() != b.values.len() {
        return Err(VectorError::DimensionMismatch {
            expected: a.values.len(),
            actual: b.values.len(),
        });
    }

    Ok(a.values
        .iter()
        .zip(b.values.iter())
        .map(|(x, y)| x * y)
        .sum())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(values: &[f32]) -> NormalizedEmbedding {
        normalize(&Embedding::new(values.to_vec())).unwrap()
    }

    #[test]
    fn test_normalize_unit_length() {
        for v in [
            vec![3.0, 4.0],
            vec![0.001, -0.002, 0.003],
            vec![120.0, -7.5, 33.0, 0.0, 1.0],
        ] {
            let n = normalize(&Embedding::new(v)).unwrap();
            let norm: f64 = n.values().iter().map(|x| x * x).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-6, "norm was {norm}");
        }
    }

    #[test]
    fn test_normalize_preserves_dimension_and_direction() {
        let n = unit(&[3.0, 4.0, 0.0]);
        assert_eq!(n.dimension(), 3);
        assert!((n.values()[0] - 0.6).abs() < 1e-6);
        assert!((n.values()[1] - 0.8).abs() < 1e-6);
        assert_eq!(n.values()[2], 0.0);
    }

    #[test]
    fn test_normalize_zero_vector() {
        let err = normalize(&Embedding::new(vec![0.0, 0.0, 0.0])).unwrap_err();
        assert_eq!(err, VectorError::DegenerateVector);
    }

    #[test]
    fn test_normalize_empty_vector() {
        let err = normalize(&Embedding::new(Vec::new())).unwrap_err();
        assert_eq!(err, VectorError::DegenerateVector);
    }

    #[test]
    fn test_normalize_rejects_nan() {
        let err = normalize(&Embedding::new(vec![f32::NAN, 1.0])).unwrap_err();
        assert_eq!(err, VectorError::DegenerateVector);
    }

    #[test]
    fn test_cosine_identical() {
        let a = unit(&[0.2, -1.3, 4.0]);
        assert!((cosine(&a, &a).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = unit(&[1.0, 0.0]);
        let b = unit(&[0.0, 1.0]);
        assert!(cosine(&a, &b).unwrap().abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = unit(&[1.0, 0.0]);
        let b = unit(&[-1.0, 0.0]);
        assert!((cosine(&a, &b).unwrap() + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_symmetric_and_bounded() {
        let vectors = [
            unit(&[1.0, 2.0, 3.0]),
            unit(&[-4.0, 0.5, 2.0]),
            unit(&[0.0, -1.0, 0.0]),
            unit(&[7.0, 7.0, -7.0]),
        ];
        for a in &vectors {
            for b in &vectors {
                let ab = cosine(a, b).unwrap();
                let ba = cosine(b, a).unwrap();
                assert_eq!(ab, ba);
                assert!((-1.0 - 1e-6..=1.0 + 1e-6).contains(&ab), "out of range: {ab}");
            }
        }
    }

    #[test]
    fn test_cosine_keeps_double_precision() {
        // 1/sqrt(1 + 1e-8) rounds to exactly 1.0 in f32
        let a = unit(&[1.0, 0.0]);
        let b = unit(&[1.0, 1e-4]);
        let sim = cosine(&a, &b).unwrap();
        assert!(sim < 1.0, "similarity collapsed to {sim}");
        assert!((1.0 - sim - 5e-9).abs() < 1e-10);
    }

    #[test]
    fn test_cosine_dimension_mismatch() {
        let a = unit(&[1.0, 0.0, 0.0]);
        let b = unit(&[1.0, 0.0]);
        assert_eq!(
            cosine(&a, &b).unwrap_err(),
            VectorError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        );
    }
}
