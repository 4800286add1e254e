//! The fixed Big-Five trait set, subject gender, and per-trait labels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One of the five scored personality traits.
///
/// Declaration order is the report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PersonalityTrait {
    Agreeableness,
    Conscientiousness,
    Extraversion,
    #[serde(rename = "Emotional Stability")]
    EmotionalStability,
    Openness,
}

impl PersonalityTrait {
    pub const ALL: [PersonalityTrait; 5] = [
        PersonalityTrait::Agreeableness,
        PersonalityTrait::Conscientiousness,
        PersonalityTrait::Extraversion,
        PersonalityTrait::EmotionalStability,
        PersonalityTrait::Openness,
    ];

    /// Human-readable name used as the report key.
    pub fn name(self) -> &'static str {
        match self {
            PersonalityTrait::Agreeableness => "Agreeableness",
            PersonalityTrait::Conscientiousness => "Conscientiousness",
            PersonalityTrait::Extraversion => "Extraversion",
            PersonalityTrait::EmotionalStability => "Emotional Stability",
            PersonalityTrait::Openness => "Openness",
        }
    }

    /// Default three-letter code used in prototype file names.
    ///
    /// Emotional Stability prototypes are coded by its opposite pole
    /// (neuroticism), hence `Neu`.
    pub fn default_code(self) -> &'static str {
        match self {
            PersonalityTrait::Agreeableness => "Agr",
            PersonalityTrait::Conscientiousness => "Con",
            PersonalityTrait::Extraversion => "Ext",
            PersonalityTrait::EmotionalStability => "Neu",
            PersonalityTrait::Openness => "Ope",
        }
    }
}

impl fmt::Display for PersonalityTrait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Subject gender; selects which prototype set is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    /// Single-letter code used in prototype file names.
    pub fn code(self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid gender '{0}': must be 'male' or 'female'")]
pub struct InvalidGender(pub String);

impl FromStr for Gender {
    type Err = InvalidGender;

    /// Accepts exactly `male` or `female`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            other => Err(InvalidGender(other.to_string())),
        }
    }
}

/// The three labels a trait can receive, keyed by how the subject's
/// similarity to the high pole compares with its similarity to the low pole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitLabels {
    /// Subject is closer to the high pole.
    pub greater: String,
    /// Similarities are equal.
    pub equal: String,
    /// Subject is closer to the low pole.
    pub less: String,
}

impl TraitLabels {
    pub fn new(greater: impl Into<String>, equal: impl Into<String>, less: impl Into<String>) -> Self {
        Self {
            greater: greater.into(),
            equal: equal.into(),
            less: less.into(),
        }
    }
}
