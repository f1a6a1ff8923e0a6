/// Audio collaborators. The session only sees these traits; actual
/// recognition and playback live outside the crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("speech service unavailable: {0}")]
    Unavailable(String),
    #[error("audio could not be decoded: {0}")]
    Decode(String),
}

/// Turns recorded audio into a transcript. An empty string means nothing
/// was recognised and is not an error.
pub trait SpeechToText {
    fn transcribe(&mut self, audio: &[u8]) -> Result<String, SpeechError>;
}

/// Speaks a visitor reply aloud.
pub trait TextToSpeech {
    fn speak(&mut self, text: &str) -> Result<(), SpeechError>;
}
