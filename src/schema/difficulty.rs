use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown difficulty '{0}': expected basic, standard or advanced")]
pub struct UnknownDifficulty(pub String);

/// Difficulty tier. Each tier fixes the fuzzy threshold used when an
/// utterance is not an exact phrase hit; higher tiers are stricter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Difficulty {
    Basic,
    #[default]
    Standard,
    Advanced,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Self::Basic, Self::Standard, Self::Advanced];

    /// Minimum similarity ratio for a fuzzy phrase match.
    pub fn threshold(&self) -> f64 {
        match self {
            Self::Basic => 0.68,
            Self::Standard => 0.72,
            Self::Advanced => 0.78,
        }
    }

    pub fn notes(&self) -> &'static str {
        match self {
            Self::Basic => "Forgiving matching. Best for starters.",
            Self::Standard => "Balanced matching. Recommended default.",
            Self::Advanced => "Stricter matching. Be clear & specific.",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Basic => "Basic",
            Self::Standard => "Standard",
            Self::Advanced => "Advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Difficulty {
    type Err = UnknownDifficulty;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "standard" => Ok(Self::Standard),
            "advanced" => Ok(Self::Advanced),
            other => Err(UnknownDifficulty(other.to_string())),
        }
    }
}
