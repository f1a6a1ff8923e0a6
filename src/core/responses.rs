/// Canned visitor replies, looked up by (intent, twist) and rendered
/// against the visitor profile.

use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::warn;

use crate::core::matcher::normalize;
use crate::core::template::{Template, TemplateError};
use crate::schema::profile::{Twist, VisitorProfile};

#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("bad reply template for '{key}': {source}")]
    Template {
        key: String,
        #[source]
        source: TemplateError,
    },
}

/// Reply used when nothing more specific applies.
pub const FALLBACK_REPLY: &str = "Okay.";

/// Key used for "spell your name" requests, whatever intent matched.
pub const SPELL_NAME_KEY: &str = "spell_name";

const CONTROL_QUESTION: &str = "control_question";

// (key, twist, text). Twist-specific rows must come with a default row for
// the same key.
const BUILTIN_REPLIES: &[(&str, Option<Twist>, &str)] = &[
    ("ask_identity", None, "My name is {name}."),
    ("ask_identity", Some(Twist::TypoName), "My name is {name}… that's {spelled_last_name}."),
    ("ask_purpose", None, "I'm here for {purpose}."),
    ("ask_appointment", None, "Yes, I have an appointment."),
    ("ask_appointment", Some(Twist::NoAppointment), "No, I don't have an appointment."),
    ("ask_host", None, "I'm meeting {host}."),
    (
        "ask_host",
        Some(Twist::NoAppointment),
        "Uh… I don't actually have an appointment. I was told I could come by.",
    ),
    ("ask_topic", None, "It's about {topic}."),
    ("ask_time", None, "It's at {time}."),
    ("ask_time", Some(Twist::VagueTime), "I think it's sometime this afternoon… I'm not sure."),
    ("request_id", None, "Sure, here is my ID."),
    ("control_question", None, "It's written on the ID."),
    ("control_question.dob", None, "My date of birth is {dob}."),
    ("control_question.address", None, "My address is {address}."),
    ("control_question.postcode", None, "My postcode is {postcode}."),
    ("control_question.nationality", None, "My nationality is {nationality}."),
    ("control_question.age", None, "I'm {age} years old."),
    ("contact_supervisor", None, "Okay, I'll wait."),
    ("inform_search_threat", None, "Understood."),
    ("inform_search_threat", Some(Twist::Annoyed), "Fine. Let's just get this over with."),
    ("prohibited_items", None, "I don't have any of those."),
    ("prohibited_items", Some(Twist::SharpObject), "I do have a small pocket knife in my bag."),
    ("prohibited_items", Some(Twist::Alcohol), "I have a bottle of wine as a gift."),
    ("request_surrender", None, "Okay."),
    ("request_surrender", Some(Twist::SharpObject), "Alright, I will hand it over."),
    ("request_surrender", Some(Twist::Alcohol), "Alright, I will hand it over."),
    ("explain_patdown", None, "Okay."),
    ("ask_sharp", None, "No."),
    ("ask_sharp", Some(Twist::SharpObject), "I already mentioned the pocket knife. Nothing else."),
    ("empty_pockets", None, "Alright, I'm emptying them now."),
    ("remove_jacket", None, "Sure, jacket is off."),
    ("announce_armpits", None, "Okay."),
    ("announce_waist", None, "Okay."),
    ("announce_private", None, "Okay."),
    ("leg_instruction", None, "Like this?"),
    ("issue_visitor_pass_rule", None, "Understood."),
    ("return_pass_rule", None, "Understood."),
    ("alarm_rally_point", None, "Understood."),
    ("closing_time", None, "Understood."),
    ("spell_name", None, "It is spelled: {spelled_name}."),
];

/// One entry of a reply document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRule {
    /// Intent name, or a sub-key such as `control_question.dob`.
    pub intent: String,
    #[serde(default)]
    pub twist: Option<Twist>,
    pub text: String,
}

/// Which detail a control question asks about. Checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlTopic {
    DateOfBirth,
    Address,
    Postcode,
    Nationality,
    Age,
}

impl ControlTopic {
    const CUES: &'static [(ControlTopic, &'static [&'static str])] = &[
        (ControlTopic::DateOfBirth, &["date of birth", "birthday", "birth", "dob", "born"]),
        (ControlTopic::Address, &["address", "where do you live"]),
        (ControlTopic::Postcode, &["postcode", "zip"]),
        (ControlTopic::Nationality, &["nationality", "citizen"]),
        (ControlTopic::Age, &["how old", "age", "years old"]),
    ];

    /// Classify a control question by keyword.
    pub fn detect(utterance: &str) -> Option<ControlTopic> {
        let text = normalize(utterance);
        Self::CUES
            .iter()
            .find(|(_, cues)| cues.iter().any(|cue| text.contains(cue)))
            .map(|(topic, _)| *topic)
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::DateOfBirth => "control_question.dob",
            Self::Address => "control_question.address",
            Self::Postcode => "control_question.postcode",
            Self::Nationality => "control_question.nationality",
            Self::Age => "control_question.age",
        }
    }
}

/// True for "can you spell your name" style requests.
pub fn wants_spelling(utterance: &str) -> bool {
    let text = normalize(utterance);
    text.contains("spell") && text.contains("name")
}

/// Lookup table from (key, twist) to a reply template.
///
/// A twist-specific entry wins over the default for the same key; a
/// profile without that twist never sees it.
#[derive(Debug, Clone, Default)]
pub struct ResponseTable {
    rules: FxHashMap<(String, Option<Twist>), Template>,
}

impl ResponseTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut table = Self::new();
        for (key, twist, text) in BUILTIN_REPLIES {
            match Template::parse(text) {
                Ok(template) => {
                    table.rules.insert((key.to_string(), *twist), template);
                }
                Err(e) => warn!(key, error = %e, "skipping built-in reply"),
            }
        }
        table
    }

    /// Add or replace one rule.
    pub fn insert(&mut self, rule: ResponseRule) -> Result<(), ResponseError> {
        let template = Template::parse(&rule.text).map_err(|source| ResponseError::Template {
            key: rule.intent.clone(),
            source,
        })?;
        self.rules.insert((rule.intent, rule.twist), template);
        Ok(())
    }

    /// Rules from a RON list of `(intent: .., twist: .., text: ..)` entries.
    pub fn parse_ron(input: &str) -> Result<ResponseTable, ResponseError> {
        let rules: Vec<ResponseRule> = ron::from_str(input)?;
        let mut table = Self::new();
        for rule in rules {
            table.insert(rule)?;
        }
        Ok(table)
    }

    /// Built-in replies with the document at `path` layered on top.
    pub fn load_from_ron(path: &Path) -> Result<ResponseTable, ResponseError> {
        let contents = std::fs::read_to_string(path)?;
        let mut table = Self::builtin();
        table.merge(Self::parse_ron(&contents)?);
        Ok(table)
    }

    /// Like [`ResponseTable::load_from_ron`], but an absent or invalid
    /// document leaves only the built-in replies.
    pub fn load_or_builtin(path: &Path) -> ResponseTable {
        match Self::load_from_ron(path) {
            Ok(table) => table,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "invalid response file, using built-in replies");
                Self::builtin()
            }
        }
    }

    /// Entries in `other` override entries with the same key and twist.
    pub fn merge(&mut self, other: ResponseTable) {
        self.rules.extend(other.rules);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Template for `key`, preferring the twist-specific entry.
    pub fn lookup(&self, key: &str, twist: Twist) -> Option<&Template> {
        self.rules
            .get(&(key.to_string(), Some(twist)))
            .or_else(|| self.rules.get(&(key.to_string(), None)))
    }

    /// The visitor's reply to a matched intent.
    pub fn respond(&self, intent: &str, utterance: &str, profile: &VisitorProfile, today: NaiveDate) -> String {
        let mut keys: Vec<&str> = Vec::with_capacity(3);
        if wants_spelling(utterance) {
            keys.push(SPELL_NAME_KEY);
        }
        if intent == CONTROL_QUESTION {
            if let Some(topic) = ControlTopic::detect(utterance) {
                keys.push(topic.key());
            }
        }
        keys.push(intent);

        keys.into_iter()
            .filter_map(|key| self.lookup(key, profile.twist))
            .find_map(|template| template.render(|field| profile_field(profile, field, today)))
            .unwrap_or_else(|| FALLBACK_REPLY.to_string())
    }
}

/// Values a reply template may reference.
fn profile_field(profile: &VisitorProfile, field: &str, today: NaiveDate) -> Option<String> {
    let value = match field {
        "name" => profile.name.clone(),
        "first_name" => profile.first_name().to_string(),
        "last_name" => profile.last_name().to_string(),
        "spelled_name" => profile.spelled_name(),
        "spelled_last_name" => profile.spelled_last_name(),
        "org" => profile.org.clone(),
        "host" => profile.host.clone(),
        "purpose" => profile.purpose.clone(),
        "topic" => profile.topic.clone(),
        "time" => profile.time.clone(),
        "dob" => profile.id.dob_display(),
        "age" => profile.id.age_on(today).to_string(),
        "address" => profile.id.address.clone(),
        "postcode" => profile.id.postcode()?,
        "nationality" => profile.id.nationality.clone(),
        "id_no" => profile.id.id_no.clone(),
        "expiry" => profile.id.expiry_display(),
        _ => return None,
    };
    Some(value)
}
