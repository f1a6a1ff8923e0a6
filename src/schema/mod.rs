pub mod difficulty;
pub mod profile;
pub mod step;
pub mod transcript;
