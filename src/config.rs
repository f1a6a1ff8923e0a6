/// Trainer configuration, loaded from a RON file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::session::{TrainerSession, TrainerSessionBuilder};
use crate::schema::difficulty::Difficulty;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Every field is optional in the file.
///
/// ```ron
/// (
///     difficulty: Advanced,
///     class_name: "4B",
///     lexicon_path: Some("phrasebook.json"),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub difficulty: Difficulty,
    pub class_name: String,
    pub student_name: String,
    pub voice_input: bool,
    pub text_to_speech: bool,
    pub lexicon_path: Option<PathBuf>,
    pub responses_path: Option<PathBuf>,
    pub scenario_path: Option<PathBuf>,
    /// Fixed seed for the first run; random when absent.
    pub seed: Option<u64>,
    pub export_dir: Option<PathBuf>,
}

impl TrainerConfig {
    pub fn parse_ron(input: &str) -> Result<TrainerConfig, ConfigError> {
        Ok(ron::from_str(input)?)
    }

    pub fn load(path: &Path) -> Result<TrainerConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Like [`TrainerConfig::load`], falling back to defaults with a warning.
    pub fn load_or_default(path: &Path) -> TrainerConfig {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return TrainerConfig::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "invalid config, using defaults");
            TrainerConfig::default()
        })
    }

    /// A session builder carrying these settings. `seed` is applied only
    /// when set.
    pub fn session_builder(&self) -> TrainerSessionBuilder {
        let mut builder = TrainerSession::builder()
            .difficulty(self.difficulty)
            .class_name(&self.class_name)
            .student_name(&self.student_name)
            .tts_enabled(self.text_to_speech);
        if let Some(seed) = self.seed {
            builder = builder.seed(seed);
        }
        if let Some(ref path) = self.lexicon_path {
            builder = builder.phrasebook(path);
        }
        if let Some(ref path) = self.responses_path {
            builder = builder.responses_file(path);
        }
        if let Some(ref path) = self.scenario_path {
            builder = builder.scenario_file(path);
        }
        builder
    }
}
