//! Embedding provider seam and the normalized-prototype cache.

use crate::embedding::{normalize, Embedding, NormalizedEmbedding};
use crate::report::ReportError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("image not found: {0}")]
    ImageNotFound(PathBuf),
    #[error("image decode failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("model file not found: {0} (export the model to ONNX and place it in the model directory)")]
    ModelNotFound(String),
    #[error("unsupported model '{0}'")]
    UnsupportedModel(String),
    #[error("no face detected")]
    NoFaceDetected,
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Maps a face image to a fixed-length embedding.
///
/// Implementations must be deterministic for a fixed model and must report
/// failure as an error, never as a zero-filled vector.
pub trait EmbeddingProvider {
    fn represent(&mut self, image_path: &Path, model_name: &str) -> Result<Embedding, ProviderError>;
}

impl<P: EmbeddingProvider + ?Sized> EmbeddingProvider for &mut P {
    fn represent(&mut self, image_path: &Path, model_name: &str) -> Result<Embedding, ProviderError> {
        (**self).represent(image_path, model_name)
    }
}

impl<P: EmbeddingProvider + ?Sized> EmbeddingProvider for Box<P> {
    fn represent(&mut self, image_path: &Path, model_name: &str) -> Result<Embedding, ProviderError> {
        (**self).represent(image_path, model_name)
    }
}

/// Embed an image and normalize it, tagging provider failures with the path.
///
/// An embedding tagged with a model other than `model_name` is rejected, so
/// subject and prototypes are always compared within one embedding space.
pub fn embed_normalized<P: EmbeddingProvider + ?Sized>(
    provider: &mut P,
    image_path: &Path,
    model_name: &str,
) -> Result<NormalizedEmbedding, ReportError> {
    let raw = provider
        .represent(image_path, model_name)
        .map_err(|source| ReportError::Provider {
            path: image_path.to_path_buf(),
            source,
        })?;

    if let Some(actual) = raw.model_version.as_deref() {
        if actual != model_name {
            return Err(ReportError::ModelMismatch {
                path: image_path.to_path_buf(),
                expected: model_name.to_string(),
                actual: actual.to_string(),
            });
        }
    }

    Ok(normalize(&raw)?)
}

/// Provider plus a cache of normalized prototype embeddings.
///
/// Prototypes are static per (model, image), so each is embedded at most once
/// for the lifetime of the store.
pub struct PrototypeStore<P> {
    provider: P,
    model: String,
    cache: HashMap<PathBuf, NormalizedEmbedding>,
}

impl<P: EmbeddingProvider> PrototypeStore<P> {
    pub fn new(provider: P, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            cache: HashMap::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    pub fn into_provider(self) -> P {
        self.provider
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Embed a subject photo. Never cached.
    pub fn embed_subject(&mut self, image_path: &Path) -> Result<NormalizedEmbedding, ReportError> {
        embed_normalized(&mut self.provider, image_path, &self.model)
    }

    /// Normalized prototype embedding for `image_path`, embedding it on first use.
    pub fn prototype(&mut self, image_path: &Path) -> Result<NormalizedEmbedding, ReportError> {
        if let Some(hit) = self.cache.get(image_path) {
            tracing::debug!(path = %image_path.display(), "prototype cache hit");
            return Ok(hit.clone());
        }

        tracing::debug!(path = %image_path.display(), model = %self.model, "embedding prototype");
        let normalized = embed_normalized(&mut self.provider, image_path, &self.model)?;
        self.cache.insert(image_path.to_path_buf(), normalized.clone());
        Ok(normalized)
    }
}
