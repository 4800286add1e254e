use anyhow::Result;
use persona_core::{EqualityPolicy, DEFAULT_MODEL};
use std::path::PathBuf;

/// CLI configuration, loaded from environment variables.
///
/// Command-line flags override these values.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Face embedding model name (default: Facenet512).
    pub model: String,
    /// Directory containing `<model>.onnx` files.
    pub model_dir: PathBuf,
    /// Directory containing the prototype face images.
    pub prototype_dir: PathBuf,
    /// Optional catalog TOML; the builtin Big-Five catalog otherwise.
    pub catalog_path: Option<PathBuf>,
    /// Similarity gap treated as a tie; `None` means exact equality.
    pub tie_tolerance: Option<f64>,
    /// ONNX Runtime intra-op threads.
    pub intra_threads: usize,
}

impl Config {
    /// Load configuration from `PERSONA_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let model_dir = var("PERSONA_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(persona_core::default_model_dir);

        Self {
            model: var("PERSONA_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            model_dir,
            prototype_dir: var("PERSONA_PROTOTYPE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("images")),
            catalog_path: var("PERSONA_CATALOG").map(PathBuf::from),
            tie_tolerance: var("PERSONA_TIE_TOLERANCE").and_then(|v| v.parse().ok()),
            intra_threads: var("PERSONA_INTRA_THREADS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),
        }
    }

    /// Tie policy for scoring. A tolerance must be finite and non-negative.
    pub fn equality_policy(&self) -> Result<EqualityPolicy> {
        match self.tie_tolerance {
            Some(eps) if !eps.is_finite() || eps < 0.0 => {
                anyhow::bail!("invalid tie tolerance {eps}: must be a finite value >= 0")
            }
            Some(eps) => Ok(EqualityPolicy::Tolerance(eps)),
            None => Ok(EqualityPolicy::Exact),
        }
    }
}
