//! persona-core — Big-Five trait direction estimates from face embeddings.
//!
//! A subject's face embedding is compared against two prototype embeddings
//! per trait (high pole, low pole); the closer pole picks the label and the
//! gap between the two cosine similarities is reported as its strength.
//! Results are illustrative heuristics over embedding geometry, not a
//! validated personality assessment.

pub mod alignment;
pub mod catalog;
pub mod detector;
pub mod embedding;
pub mod evaluator;
pub mod provider;
pub mod recognizer;
pub mod report;
pub mod traits;

pub use catalog::{CatalogError, PolePaths, PrototypeCatalog};
pub use detector::{FaceBox, FaceDetector, SCRFD_MODEL_FILE};
pub use embedding::{cosine, normalize, Embedding, NormalizedEmbedding, VectorError};
pub use evaluator::{evaluate_trait, evaluate_trait_with, EqualityPolicy, TraitResult};
pub use provider::{EmbeddingProvider, PrototypeStore, ProviderError};
pub use recognizer::{ModelProfile, OnnxProvider, DEFAULT_MODEL, KNOWN_MODELS};
pub use report::{build_report, PersonalityReport, ReportError, TraitScorer};
pub use traits::{Gender, PersonalityTrait, TraitLabels};

/// Default directory holding ONNX model files.
///
/// `$XDG_DATA_HOME/persona/models`, falling back to `~/.local/share/persona/models`.
pub fn default_model_dir() -> std::path::PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            std::path::PathBuf::from(home).join(".local/share")
        })
        .join("persona")
        .join("models")
}
