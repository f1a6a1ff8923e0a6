/// End-of-run feedback for the learner.

use std::fmt;

use crate::core::lexicon::Lexicon;
use crate::core::matcher::{normalize, IntentMatcher};
use crate::core::session::TrainerSession;

/// Global ordering used to rank missed intents.
pub const INTENT_PRIORITY: &[&str] = &[
    "ask_identity",
    "ask_purpose",
    "ask_appointment",
    "ask_host",
    "ask_time",
    "ask_topic",
    "request_id",
    "control_question",
    "contact_supervisor",
    "inform_search_threat",
    "prohibited_items",
    "request_surrender",
    "explain_patdown",
    "ask_sharp",
    "empty_pockets",
    "remove_jacket",
    "announce_armpits",
    "announce_waist",
    "announce_private",
    "leg_instruction",
    "issue_visitor_pass_rule",
    "return_pass_rule",
    "alarm_rally_point",
    "closing_time",
];

const EXAMPLE_BY_INTENT: &[(&str, &str)] = &[
    ("ask_identity", "Could you tell me your name, please?"),
    ("ask_purpose", "What are you doing here today?"),
    ("ask_appointment", "Do you have an appointment?"),
    ("ask_host", "With whom do you have an appointment?"),
    ("ask_time", "What time is your appointment?"),
    ("ask_topic", "What is the appointment about?"),
    ("request_id", "May I see your ID, please?"),
    ("control_question", "Can you tell me your date of birth, please?"),
    ("contact_supervisor", "One moment, I will contact my supervisor."),
    ("inform_search_threat", "Due to an increased threat level, you will be searched before entry."),
    ("prohibited_items", "You are not allowed to bring weapons, drugs, or alcohol onto the base."),
    ("request_surrender", "If you have any prohibited items, please hand them over now."),
    ("explain_patdown", "I will conduct a security search (a pat-down)."),
    ("ask_sharp", "Do you have any sharp objects on you?"),
    ("empty_pockets", "Please empty your pockets and place the items in the tray."),
    ("remove_jacket", "Please remove your jacket/coat."),
    ("announce_armpits", "I am searching under your armpits."),
    ("announce_waist", "I am searching around your waist."),
    ("announce_private", "I am searching around your private parts."),
    ("leg_instruction", "Please place your foot on your knee."),
    ("issue_visitor_pass_rule", "Here is your visitor pass. Wear it visibly at all times."),
    ("return_pass_rule", "Please return the visitor pass at the end of your visit."),
    ("alarm_rally_point", "If the alarm sounds, go to the assembly area (rally point)."),
    (
        "closing_time",
        "The base is closed to visitors after 16:00. All visitors must have left by then.",
    ),
];

const PATDOWN_EXPLANATION: &str = "explain_patdown";
const BODY_ANNOUNCEMENTS: [&str; 3] = ["announce_armpits", "announce_waist", "announce_private"];
const TOP_MISSES: usize = 3;

/// A model phrasing for an intent, if one is known.
pub fn example_for(intent: &str) -> Option<&'static str> {
    EXAMPLE_BY_INTENT
        .iter()
        .find(|(name, _)| *name == intent)
        .map(|(_, example)| *example)
}

fn priority(intent: &str) -> usize {
    INTENT_PRIORITY
        .iter()
        .position(|p| *p == intent)
        .unwrap_or(usize::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissedIntent {
    pub intent: String,
    pub example: Option<&'static str>,
}

impl MissedIntent {
    fn new(intent: &str) -> Self {
        Self {
            intent: intent.to_string(),
            example: example_for(intent),
        }
    }
}

impl fmt::Display for MissedIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.example {
            Some(example) => write!(f, "{}, e.g. \"{}\"", self.intent, example),
            None => f.write_str(&self.intent),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepMisses {
    pub key: String,
    pub title: String,
    pub missed: Vec<MissedIntent>,
}

/// True unless a learner announced a body area before explaining the
/// pat-down. Lines are matched against the lexicon with `matcher`.
pub fn announcements_in_order<'a, I>(learner_lines: I, lexicon: &Lexicon, matcher: &IntentMatcher) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    for line in learner_lines {
        if matcher.matches(line, lexicon.phrases(PATDOWN_EXPLANATION)) {
            return true;
        }
        if BODY_ANNOUNCEMENTS
            .iter()
            .any(|intent| matcher.matches(line, lexicon.phrases(intent)))
        {
            return false;
        }
    }
    true
}

/// Share of lines containing "please"; 0 when there are none.
pub fn politeness_rate<'a, I>(learner_lines: I) -> f64
where
    I: IntoIterator<Item = &'a str>,
{
    let (polite, total) = learner_lines.into_iter().fold((0usize, 0usize), |(p, t), line| {
        (p + usize::from(normalize(line).contains("please")), t + 1)
    });
    if total == 0 {
        0.0
    } else {
        polite as f64 / total as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feedback {
    pub completed: usize,
    pub total: usize,
    pub completion_rate: f64,
    pub order_ok: bool,
    pub learner_turns: usize,
    pub politeness_rate: f64,
    /// At most three misses, most important first.
    pub top_misses: Vec<MissedIntent>,
    /// Steps with at least one miss, in procedure order.
    pub misses_by_step: Vec<StepMisses>,
}

impl Feedback {
    pub fn from_session(session: &TrainerSession) -> Feedback {
        let (completed, total) = session.completed_counts();
        let transcript = session.transcript();
        let matcher = IntentMatcher::new(session.difficulty());

        let misses_by_step: Vec<StepMisses> = session
            .steps()
            .iter()
            .filter_map(|step| {
                let missed: Vec<MissedIntent> = step
                    .required
                    .iter()
                    .filter(|intent| !session.is_satisfied(intent))
                    .map(|intent| MissedIntent::new(intent))
                    .collect();
                (!missed.is_empty()).then(|| StepMisses {
                    key: step.key.clone(),
                    title: step.title.clone(),
                    missed,
                })
            })
            .collect();

        let mut top_misses: Vec<MissedIntent> = Vec::new();
        for missed in misses_by_step.iter().flat_map(|s| &s.missed) {
            if !top_misses.iter().any(|m| m.intent == missed.intent) {
                top_misses.push(missed.clone());
            }
        }
        top_misses.sort_by_key(|m| priority(&m.intent));
        top_misses.truncate(TOP_MISSES);

        Feedback {
            completed,
            total,
            completion_rate: if total == 0 { 0.0 } else { completed as f64 / total as f64 },
            order_ok: announcements_in_order(transcript.learner_lines(), session.lexicon(), &matcher),
            learner_turns: transcript.learner_lines().count(),
            politeness_rate: politeness_rate(transcript.learner_lines()),
            top_misses,
            misses_by_step,
        }
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Completed {}/{} items ({:.0}%).",
            self.completed,
            self.total,
            self.completion_rate * 100.0
        )?;
        if self.order_ok {
            writeln!(f, "Search order: OK.")?;
        } else {
            writeln!(f, "Search order: explain the pat-down before announcing body areas.")?;
        }
        writeln!(
            f,
            "Politeness: {:.0}% of your {} lines said \"please\".",
            self.politeness_rate * 100.0,
            self.learner_turns
        )?;

        if self.top_misses.is_empty() {
            return writeln!(f, "No misses, well done.");
        }
        writeln!(f, "Top improvements:")?;
        for missed in &self.top_misses {
            writeln!(f, "  - {}", missed)?;
        }
        writeln!(f, "All missed items:")?;
        for step in &self.misses_by_step {
            writeln!(f, "  {}", step.title)?;
            for missed in &step.missed {
                writeln!(f, "    - {}", missed)?;
            }
        }
        Ok(())
    }
}
