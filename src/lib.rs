//! Entry Trainer: a scripted role-play dialogue engine for entry-control
//! language training.
//!
//! A generated visitor answers the learner's free-text questions across an
//! ordered procedure (gate interview, ID check, threat briefing, pat-down,
//! registration). Recognition is lexical: fuzzy phrase matching against a
//! versioned lexicon, tuned per difficulty tier.

pub mod config;
pub mod core;
pub mod schema;

pub use crate::config::TrainerConfig;
pub use crate::core::lexicon::{Lexicon, Phrasebook};
pub use crate::core::session::{StepProgress, TrainerSession, Turn, TurnOutcome};
pub use crate::schema::difficulty::Difficulty;
