//! Prototype catalog.
//!
//! A declarative table mapping each trait to its label set and, per gender,
//! to the two prototype images (high pole, low pole). The default Big-Five
//! table is embedded at compile time from `contrib/catalog/big-five.toml`;
//! alternate tables can be loaded from any TOML file with the same layout.

use crate::traits::{Gender, PersonalityTrait, TraitLabels};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Compile-time embedded Big-Five catalog.
const BUILTIN_CATALOG: &str = include_str!("../../../contrib/catalog/big-five.toml");

const DEFAULT_PATTERN: &str = "{trait}_{gender}{pole}.png";

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("bad catalog TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("catalog has no entry for trait '{0}'")]
    MissingTrait(PersonalityTrait),
    #[error("catalog defines trait '{0}' more than once")]
    DuplicateTrait(PersonalityTrait),
    #[error("naming pattern '{0}' must contain {{pole}}")]
    InvalidPattern(String),
}

/// File naming convention from the `[naming]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct NamingConvention {
    /// Placeholders: `{trait}`, `{gender}`, `{pole}`.
    #[serde(default = "default_pattern")]
    pub pattern: String,
    #[serde(default = "default_high_pole")]
    pub high_pole: String,
    #[serde(default = "default_low_pole")]
    pub low_pole: String,
}

fn default_pattern() -> String {
    DEFAULT_PATTERN.to_string()
}

fn default_high_pole() -> String {
    "A".to_string()
}

fn default_low_pole() -> String {
    "B".to_string()
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            high_pole: default_high_pole(),
            low_pole: default_low_pole(),
        }
    }
}

impl NamingConvention {
    fn file_name(&self, code: &str, gender: Gender, pole: &str) -> String {
        self.pattern
            .replace("{trait}", code)
            .replace("{gender}", gender.code())
            .replace("{pole}", pole)
    }
}

/// Explicit file names for one gender, bypassing the naming pattern.
#[derive(Debug, Clone, Deserialize)]
pub struct PoleFiles {
    pub high: String,
    pub low: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenderFiles {
    pub male: Option<PoleFiles>,
    pub female: Option<PoleFiles>,
}

/// One `[[traits]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TraitSpec {
    #[serde(rename = "trait")]
    pub kind: PersonalityTrait,
    /// File-name code; defaults to [`PersonalityTrait::default_code`].
    pub code: Option<String>,
    #[serde(flatten)]
    pub labels: TraitLabels,
    #[serde(default)]
    pub files: GenderFiles,
}

impl TraitSpec {
    pub fn code(&self) -> &str {
        self.code.as_deref().unwrap_or(self.kind.default_code())
    }
}

/// Top-level catalog file structure.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub naming: NamingConvention,
    pub traits: Vec<TraitSpec>,
}

/// Resolved prototype image paths for one (trait, gender) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolePaths {
    pub high: PathBuf,
    pub low: PathBuf,
}

/// A validated catalog bound to a prototype image directory.
///
/// Holds exactly one entry per trait, in report order. Read-only once built.
#[derive(Debug, Clone)]
pub struct PrototypeCatalog {
    base_dir: PathBuf,
    naming: NamingConvention,
    traits: Vec<TraitSpec>,
}

impl PrototypeCatalog {
    /// Validate a parsed catalog file and bind it to `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>, file: CatalogFile) -> Result<Self, CatalogError> {
        if !file.naming.pattern.contains("{pole}") {
            return Err(CatalogError::InvalidPattern(file.naming.pattern));
        }

        let mut traits = file.traits;
        traits.sort_by_key(|t| t.kind);
        for pair in traits.windows(2) {
            if pair[0].kind == pair[1].kind {
                return Err(CatalogError::DuplicateTrait(pair[0].kind));
            }
        }
        for kind in PersonalityTrait::ALL {
            if !traits.iter().any(|t| t.kind == kind) {
                return Err(CatalogError::MissingTrait(kind));
            }
        }

        Ok(Self {
            base_dir: base_dir.into(),
            naming: file.naming,
            traits,
        })
    }

    /// The embedded Big-Five catalog.
    pub fn builtin(base_dir: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        Self::from_toml_str(base_dir, BUILTIN_CATALOG)
    }

    pub fn from_toml_str(base_dir: impl Into<PathBuf>, src: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(src)?;
        Self::new(base_dir, file)
    }

    /// Load a catalog TOML file from disk.
    pub fn load(base_dir: impl Into<PathBuf>, path: &Path) -> Result<Self, CatalogError> {
        let src = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded prototype catalog");
        Self::from_toml_str(base_dir, &src)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Trait entries in report order.
    pub fn traits(&self) -> &[TraitSpec] {
        &self.traits
    }

    pub fn get(&self, kind: PersonalityTrait) -> Option<&TraitSpec> {
        self.traits.iter().find(|t| t.kind == kind)
    }

    /// Resolve the (high, low) prototype image paths for one trait entry.
    pub fn resolve(&self, spec: &TraitSpec, gender: Gender) -> PolePaths {
        let explicit = match gender {
            Gender::Male => spec.files.male.as_ref(),
            Gender::Female => spec.files.female.as_ref(),
        };

        let (high, low) = match explicit {
            Some(files) => (files.high.clone(), files.low.clone()),
            None => (
                self.naming.file_name(spec.code(), gender, &self.naming.high_pole),
                self.naming.file_name(spec.code(), gender, &self.naming.low_pole),
            ),
        };

        PolePaths {
            high: self.base_dir.join(high),
            low: self.base_dir.join(low),
        }
    }

    /// All prototype paths needed to score one gender, in report order.
    pub fn prototype_paths(&self, gender: Gender) -> Vec<(PersonalityTrait, PolePaths)> {
        self.traits
            .iter()
            .map(|spec| (spec.kind, self.resolve(spec, gender)))
            .collect()
    }
}
