//! Report assembly: score every trait in the catalog for one subject.

use crate::catalog::PrototypeCatalog;
use crate::embedding::{normalize, Embedding, NormalizedEmbedding, VectorError};
use crate::evaluator::{evaluate_trait_with, EqualityPolicy, TraitResult};
use crate::provider::{EmbeddingProvider, PrototypeStore, ProviderError};
use crate::traits::{Gender, InvalidGender, PersonalityTrait};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    InvalidGender(#[from] InvalidGender),
    #[error("embedding provider failed for {path}: {source}")]
    Provider {
        path: PathBuf,
        #[source]
        source: ProviderError,
    },
    #[error("embedding for {path} came from model '{actual}', expected '{expected}'")]
    ModelMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
    #[error(transparent)]
    Vector(#[from] VectorError),
}

/// Scored result for every trait, keyed in report order.
///
/// Only produced whole: a failure on any trait aborts the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PersonalityReport {
    results: BTreeMap<PersonalityTrait, TraitResult>,
}

impl PersonalityReport {
    pub fn get(&self, kind: PersonalityTrait) -> Option<&TraitResult> {
        self.results.get(&kind)
    }

    /// Rounded view for display and JSON output: trait name → (label, strength).
    pub fn rounded(&self) -> BTreeMap<PersonalityTrait, TraitResult> {
        self.results
            .iter()
            .map(|(k, v)| {
                (
                    *k,
                    TraitResult {
                        label: v.label.clone(),
                        strength: v.rounded_strength(),
                    },
                )
            })
            .collect()
    }
}

impl fmt::Display for PersonalityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (kind, result) in &self.results {
            writeln!(
                f,
                "{kind}: {} (Abs. diff. in cosine sim.: {:?})",
                result.label,
                result.rounded_strength()
            )?;
        }
        Ok(())
    }
}

/// Score `subject` against every trait in `catalog` for `gender`.
///
/// `gender` is validated before any provider call. Prototypes come from
/// `prototypes`, which embeds and caches them on first use.
pub fn build_report<P: EmbeddingProvider>(
    subject: &Embedding,
    gender: &str,
    catalog: &PrototypeCatalog,
    prototypes: &mut PrototypeStore<P>,
) -> Result<PersonalityReport, ReportError> {
    let gender = parse_gender(gender)?;
    let subject = normalize(subject)?;
    score_normalized(&subject, gender, catalog, prototypes, EqualityPolicy::Exact)
}

fn score_normalized<P: EmbeddingProvider>(
    subject: &NormalizedEmbedding,
    gender: Gender,
    catalog: &PrototypeCatalog,
    prototypes: &mut PrototypeStore<P>,
    policy: EqualityPolicy,
) -> Result<PersonalityReport, ReportError> {
    let mut results = BTreeMap::new();

    for spec in catalog.traits() {
        let paths = catalog.resolve(spec, gender);
        let high = prototypes.prototype(&paths.high)?;
        let low = prototypes.prototype(&paths.low)?;

        let result = evaluate_trait_with(subject, &high, &low, &spec.labels, policy)?;
        tracing::debug!(
            trait_name = spec.kind.name(),
            label = %result.label,
            strength = result.strength,
            "trait scored"
        );
        results.insert(spec.kind, result);
    }

    Ok(PersonalityReport { results })
}

/// Long-lived scorer: one catalog, one model, shared prototype cache.
///
/// Scoring several photos through the same scorer embeds each prototype once.
pub struct TraitScorer<P> {
    catalog: PrototypeCatalog,
    prototypes: PrototypeStore<P>,
    policy: EqualityPolicy,
}

impl<P: EmbeddingProvider> TraitScorer<P> {
    pub fn new(provider: P, catalog: PrototypeCatalog, model: impl Into<String>) -> Self {
        Self {
            catalog,
            prototypes: PrototypeStore::new(provider, model),
            policy: EqualityPolicy::Exact,
        }
    }

    pub fn with_policy(mut self, policy: EqualityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn prototypes(&self) -> &PrototypeStore<P> {
        &self.prototypes
    }

    pub fn prototypes_mut(&mut self) -> &mut PrototypeStore<P> {
        &mut self.prototypes
    }

    /// Score a precomputed subject embedding.
    pub fn score_embedding(&mut self, subject: &Embedding, gender: &str) -> Result<PersonalityReport, ReportError> {
        let gender = parse_gender(gender)?;
        let subject = normalize(subject)?;
        score_normalized(&subject, gender, &self.catalog, &mut self.prototypes, self.policy)
    }

    /// Embed `photo` and score it. Gender is checked before the photo is touched.
    pub fn score_photo(&mut self, photo: &Path, gender: &str) -> Result<PersonalityReport, ReportError> {
        let gender = parse_gender(gender)?;
        tracing::info!(photo = %photo.display(), %gender, model = self.prototypes.model(), "scoring photo");

        let subject = self.prototypes.embed_subject(photo)?;
        score_normalized(&subject, gender, &self.catalog, &mut self.prototypes, self.policy)
    }
}

fn parse_gender(gender: &str) -> Result<Gender, ReportError> {
    Ok(gender.parse::<Gender>()?)
}
