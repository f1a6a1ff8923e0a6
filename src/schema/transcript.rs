use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Timestamp format used in transcripts and exports.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Speaker {
    Learner,
    Visitor,
    System,
}

impl Speaker {
    /// Column value used in the chat log export.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Learner => "YOU",
            Self::Visitor => "VISITOR",
            Self::System => "SYSTEM",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub timestamp: NaiveDateTime,
    pub speaker: Speaker,
    pub text: String,
}

impl TranscriptEntry {
    pub fn timestamp_display(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}

/// Current local time truncated to whole seconds.
pub fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Append-only record of a run's turns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.entries.push(TranscriptEntry {
            timestamp: now(),
            speaker,
            text: text.into(),
        });
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index and text of the most recent visitor line.
    pub fn last_visitor_line(&self) -> Option<(usize, &str)> {
        self.entries
            .iter()
            .enumerate()
            .rev()
            .find(|(_, e)| e.speaker == Speaker::Visitor)
            .map(|(i, e)| (i, e.text.as_str()))
    }

    pub fn learner_lines(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| e.speaker == Speaker::Learner)
            .map(|e| e.text.as_str())
    }

    pub fn count_by(&self, speaker: Speaker) -> usize {
        self.entries.iter().filter(|e| e.speaker == speaker).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_preserves_order() {
        let mut t = Transcript::new();
        t.push(Speaker::Visitor, "Good morning.");
        t.push(Speaker::Learner, "What is your name?");
        t.push(Speaker::Visitor, "My name is Tom Smit.");
        t.push(Speaker::System, "Step complete.");

        assert_eq!(t.len(), 4);
        assert_eq!(t.entries()[1].speaker, Speaker::Learner);
        assert_eq!(t.last_visitor_line(), Some((2, "My name is Tom Smit.")));
        assert_eq!(t.learner_lines().collect::<Vec<_>>(), vec!["What is your name?"]);
        assert_eq!(t.count_by(Speaker::Visitor), 2);
    }

    #[test]
    fn empty_transcript_has_no_visitor_line() {
        let t = Transcript::new();
        assert!(t.is_empty());
        assert_eq!(t.last_visitor_line(), None);
    }

    #[test]
    fn timestamps_have_no_fraction() {
        let mut t = Transcript::new();
        t.push(Speaker::System, "x");
        assert_eq!(t.entries()[0].timestamp.nanosecond(), 0);
        assert_eq!(t.entries()[0].timestamp_display().len(), 19);
    }

    #[test]
    fn speaker_tags() {
        assert_eq!(Speaker::Learner.tag(), "YOU");
        assert_eq!(Speaker::Visitor.tag(), "VISITOR");
        assert_eq!(Speaker::System.tag(), "SYSTEM");
    }
}
