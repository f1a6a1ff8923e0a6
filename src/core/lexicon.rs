/// Phrase lexicon: built-in intent phrases, the operator phrasebook
/// document and the immutable snapshots the session matches against.

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::matcher::normalize;
use crate::core::template::Template;

#[derive(Debug, Error)]
pub enum LexiconError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("JSON deserialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Intent name → ordered reference phrases.
pub type PhraseTable = HashMap<String, Vec<String>>;

/// Operator-supplied phrases per intent, already stripped of invalid entries.
pub type IntentAdditions = BTreeMap<String, Vec<String>>;

pub const DEFAULT_REFLECT_TEMPLATE: &str = "Just to confirm: are you asking '{q}'?";

const BASE_PHRASES: &[(&str, &[&str])] = &[
    ("ask_identity", &[
        "who are you", "what is your name", "your name please", "identify yourself",
        "may i have your name", "can you tell me your name",
    ]),
    ("ask_purpose", &[
        "what are you doing here", "what is the purpose", "why are you here",
        "reason for your visit", "what brings you here", "what is your reason for visiting",
    ]),
    ("ask_appointment", &[
        "do you have an appointment", "have you got an appointment",
        "do you have a meeting scheduled", "do you have an appointment scheduled",
        "are you expected", "do you have a booking",
    ]),
    ("ask_host", &[
        "who are you meeting", "who do you have an appointment with",
        "with whom do you have a meeting", "who is your host", "who is expecting you",
    ]),
    ("ask_time", &[
        "what time is the appointment", "what time is your meeting", "appointment time",
        "when is the appointment", "what time is it scheduled", "what time is that",
        "what time is that delivery", "what time is the delivery", "what time is your delivery",
        "what time is your inspection", "what time is that inspection",
        "what time is that meeting", "what time is that appointment",
    ]),
    ("ask_topic", &[
        "what is the appointment about", "what is the meeting about", "topic of the appointment",
        "what is it regarding", "what is the purpose of the meeting",
    ]),
    ("request_id", &[
        "can i see your id", "show me your id", "id please", "identification please",
        "may i see your identification", "could you show your id",
    ]),
    ("control_question", &[
        "date of birth", "what is your date of birth", "what is your birthday",
        "what is your address", "what is your postcode", "what is your zip code", "nationality",
        "how old are you", "what is your age", "where do you live", "dob", "what is your dob",
        "what's your dob", "when is your birthday", "when were you born", "you are", "you're",
        "confirm your age", "confirm your date of birth",
    ]),
    ("contact_supervisor", &[
        "i will contact my supervisor", "i will call my supervisor",
        "one moment i will contact my supervisor", "please wait i will contact",
        "i will check with my supervisor",
    ]),
    ("inform_search_threat", &[
        "heightened threat", "increased threat", "security level", "you will be searched",
        "for security reasons you will be searched", "due to a higher threat level",
    ]),
    ("prohibited_items", &[
        "no weapons", "no drugs", "no alcohol", "prohibited items", "weapons drugs or alcohol",
        "you are not allowed to bring weapons", "you are not allowed to bring drugs",
        "you are not allowed to bring alcohol",
    ]),
    ("request_surrender", &[
        "please hand them over", "you must surrender", "give them to me",
        "you have to hand it over", "hand it over",
    ]),
    ("explain_patdown", &[
        "i will pat you down", "i am going to search you", "i will frisk you",
        "i will conduct a security search", "i will perform a pat-down",
    ]),
    ("ask_sharp", &[
        "sharp objects", "anything sharp", "needles", "anything that can hurt",
        "do you have anything sharp", "any sharp items",
    ]),
    ("empty_pockets", &[
        "empty your pockets", "take everything out of your pockets",
        "put your items on the table", "place your belongings in the tray",
    ]),
    ("remove_jacket", &[
        "remove your jacket", "take off your jacket", "remove your coat", "remove your outerwear",
    ]),
    ("announce_armpits", &["under your armpits", "armpits"]),
    ("announce_waist", &["around your waist", "waistline"]),
    ("announce_private", &["private parts", "groin area", "around your private parts"]),
    ("leg_instruction", &[
        "place your foot on your knee", "rest your ankle on your knee",
        "lift your leg and place it", "put your foot on your knee",
    ]),
    ("issue_visitor_pass_rule", &[
        "here is your visitor pass", "visitor badge", "wear it visibly", "visible at all times",
        "you must wear it", "keep it visible",
    ]),
    ("return_pass_rule", &[
        "return it at the end", "hand it in at the end", "give it back when you leave",
        "return the pass", "return the badge",
    ]),
    ("alarm_rally_point", &[
        "if the alarm sounds", "assembly area", "rally point", "muster point",
        "go to the assembly area", "go to the rally point",
    ]),
    ("closing_time", &[
        "we close at four", "closing time is 16:00", "visitors must leave by 4 pm",
        "the base closes for visitors at 4", "all visitors must leave by four",
    ]),
];

/// The built-in phrase table.
pub fn base_phrases() -> PhraseTable {
    BASE_PHRASES
        .iter()
        .map(|(intent, phrases)| {
            (
                intent.to_string(),
                phrases.iter().map(|p| p.to_string()).collect(),
            )
        })
        .collect()
}

/// Per-intent concatenation of `additions` onto `base`.
///
/// Order within each intent is preserved (base first). Unknown intents get
/// a new bucket; blank phrases are skipped; duplicates are kept.
pub fn merge(base: &PhraseTable, additions: &IntentAdditions) -> PhraseTable {
    let mut merged = base.clone();
    for (intent, phrases) in additions {
        let bucket = merged.entry(intent.clone()).or_default();
        bucket.extend(
            phrases
                .iter()
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        );
    }
    merged
}

/// A scripted small-talk exchange matched before any intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmalltalkEntry {
    pub name: String,
    pub patterns: Vec<String>,
    pub response: String,
}

/// The operator-editable phrasebook document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phrasebook {
    pub smalltalk: Vec<SmalltalkEntry>,
    pub reflect_template: String,
    pub intents: IntentAdditions,
}

impl Default for Phrasebook {
    fn default() -> Self {
        Self {
            smalltalk: Vec::new(),
            reflect_template: DEFAULT_REFLECT_TEMPLATE.to_string(),
            intents: IntentAdditions::new(),
        }
    }
}

// On-disk shape. Every section and field falls back on its own, so a
// stray number, null or wrong-shaped section drops only that part instead
// of rejecting the document.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPhrasebook {
    smalltalk: Loose<Vec<Loose<RawSmalltalk>>>,
    off_script: RawOffScript,
    intents: Loose<HashMap<String, Loose<Vec<Loose<String>>>>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSmalltalk {
    name: Loose<String>,
    patterns: Loose<RawPatterns>,
    response: Loose<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPatterns {
    List(Vec<Loose<String>>),
    Single(String),
}

impl Default for RawPatterns {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

/// Either the bare template string or `{reflect_question_template: ..}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawOffScript {
    Template(String),
    Section {
        #[serde(default)]
        reflect_question_template: Loose<String>,
    },
    Invalid(IgnoredAny),
}

impl Default for RawOffScript {
    fn default() -> Self {
        Self::Template(String::new())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Loose<T> {
    Valid(T),
    Invalid(IgnoredAny),
}

impl<T: Default> Default for Loose<T> {
    fn default() -> Self {
        Self::Valid(T::default())
    }
}

impl<T> Loose<T> {
    fn valid(self) -> Option<T> {
        match self {
            Self::Valid(value) => Some(value),
            Self::Invalid(_) => None,
        }
    }
}

/// Something a loader dropped or replaced while reading a phrasebook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhrasebookIssue {
    /// A whole top-level section had the wrong shape and was ignored.
    InvalidSection(&'static str),
    /// Non-string or blank entries removed from an intent's list.
    DroppedPhrases { intent: String, count: usize },
    /// The intent's value was not a list and was ignored.
    IntentNotAList(String),
    /// The small-talk entry at this position was not a record.
    InvalidSmalltalk(usize),
    DroppedPatterns { smalltalk: String, count: usize },
    /// A small-talk entry without patterns or response was ignored.
    IncompleteSmalltalk(String),
    /// Missing or blank reflect template, replaced by the default.
    DefaultReflectTemplate,
}

impl std::fmt::Display for PhrasebookIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSection(section) => write!(f, "section '{}' is malformed and was ignored", section),
            Self::DroppedPhrases { intent, count } => {
                write!(f, "intent '{}': {} empty or non-text phrase(s) ignored", intent, count)
            }
            Self::IntentNotAList(intent) => write!(f, "intent '{}' is not a list of phrases", intent),
            Self::InvalidSmalltalk(index) => write!(f, "smalltalk entry #{} is not a record", index + 1),
            Self::DroppedPatterns { smalltalk, count } => {
                write!(f, "smalltalk '{}': {} empty or non-text pattern(s) ignored", smalltalk, count)
            }
            Self::IncompleteSmalltalk(name) => {
                write!(f, "smalltalk '{}' has no patterns or no response", name)
            }
            Self::DefaultReflectTemplate => f.write_str("no reflect template, using the default"),
        }
    }
}

/// Trimmed text entries, plus how many entries were dropped.
fn clean(list: Vec<Loose<String>>) -> (Vec<String>, usize) {
    let total = list.len();
    let kept: Vec<String> = list
        .into_iter()
        .filter_map(Loose::valid)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let dropped = total - kept.len();
    (kept, dropped)
}

fn text(value: Loose<String>) -> String {
    value.valid().map(|s| s.trim().to_string()).unwrap_or_default()
}

fn from_raw(raw: RawPhrasebook) -> (Phrasebook, Vec<PhrasebookIssue>) {
    let mut issues = Vec::new();

    let entries = raw.smalltalk.valid().unwrap_or_else(|| {
        issues.push(PhrasebookIssue::InvalidSection("smalltalk"));
        Vec::new()
    });
    let mut smalltalk = Vec::new();
    for (index, entry) in entries.into_iter().enumerate() {
        let Some(entry) = entry.valid() else {
            issues.push(PhrasebookIssue::InvalidSmalltalk(index));
            continue;
        };
        let name = match text(entry.name) {
            name if name.is_empty() => "smalltalk".to_string(),
            name => name,
        };
        let (patterns, dropped) = match entry.patterns.valid() {
            Some(RawPatterns::List(list)) => clean(list),
            Some(RawPatterns::Single(pattern)) => clean(vec![Loose::Valid(pattern)]),
            None => (Vec::new(), 0),
        };
        if dropped > 0 {
            issues.push(PhrasebookIssue::DroppedPatterns {
                smalltalk: name.clone(),
                count: dropped,
            });
        }
        let response = text(entry.response);
        if patterns.is_empty() || response.is_empty() {
            issues.push(PhrasebookIssue::IncompleteSmalltalk(name));
            continue;
        }
        smalltalk.push(SmalltalkEntry {
            name,
            patterns,
            response,
        });
    }

    let template = match raw.off_script {
        RawOffScript::Template(tpl) => tpl.trim().to_string(),
        RawOffScript::Section {
            reflect_question_template,
        } => text(reflect_question_template),
        RawOffScript::Invalid(_) => {
            issues.push(PhrasebookIssue::InvalidSection("off_script"));
            String::new()
        }
    };
    let reflect_template = if template.is_empty() {
        issues.push(PhrasebookIssue::DefaultReflectTemplate);
        DEFAULT_REFLECT_TEMPLATE.to_string()
    } else {
        template
    };

    let raw_intents = raw.intents.valid().unwrap_or_else(|| {
        issues.push(PhrasebookIssue::InvalidSection("intents"));
        HashMap::new()
    });
    let mut intents = IntentAdditions::new();
    for (intent, phrases) in raw_intents {
        match phrases.valid() {
            Some(list) => {
                let (phrases, dropped) = clean(list);
                if dropped > 0 {
                    issues.push(PhrasebookIssue::DroppedPhrases {
                        intent: intent.clone(),
                        count: dropped,
                    });
                }
                intents.insert(intent, phrases);
            }
            None => issues.push(PhrasebookIssue::IntentNotAList(intent)),
        }
    }

    let phrasebook = Phrasebook {
        smalltalk,
        reflect_template,
        intents,
    };
    (phrasebook, issues)
}

impl Phrasebook {
    pub fn parse_ron(input: &str) -> Result<Phrasebook, LexiconError> {
        Ok(Self::parse_ron_checked(input)?.0)
    }

    pub fn parse_json(input: &str) -> Result<Phrasebook, LexiconError> {
        Ok(Self::parse_json_checked(input)?.0)
    }

    /// Parse, also reporting what was dropped on the way.
    pub fn parse_ron_checked(input: &str) -> Result<(Phrasebook, Vec<PhrasebookIssue>), LexiconError> {
        let raw: RawPhrasebook = ron::from_str(input)?;
        Ok(from_raw(raw))
    }

    pub fn parse_json_checked(input: &str) -> Result<(Phrasebook, Vec<PhrasebookIssue>), LexiconError> {
        let raw: RawPhrasebook = serde_json::from_str(input)?;
        Ok(from_raw(raw))
    }

    /// Load from a `.json` file, or RON for any other extension.
    pub fn load(path: &Path) -> Result<Phrasebook, LexiconError> {
        Ok(Self::load_checked(path)?.0)
    }

    pub fn load_checked(path: &Path) -> Result<(Phrasebook, Vec<PhrasebookIssue>), LexiconError> {
        let contents = std::fs::read_to_string(path)?;
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            Self::parse_json_checked(&contents)
        } else {
            Self::parse_ron_checked(&contents)
        }
    }

    /// Like [`Phrasebook::load`], but an absent or unreadable document yields
    /// the built-in default.
    pub fn load_or_default(path: &Path) -> Phrasebook {
        if !path.exists() {
            debug!(path = %path.display(), "no phrasebook file, using defaults");
            return Phrasebook::default();
        }
        match Self::load_checked(path) {
            Ok((pb, issues)) => {
                for issue in &issues {
                    debug!(path = %path.display(), %issue, "phrasebook entry adjusted");
                }
                pb
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "invalid phrasebook, using defaults");
                Phrasebook::default()
            }
        }
    }
}

/// True when `source` parses and uses exactly the `{q}` placeholder.
pub fn is_valid_reflect_template(source: &str) -> bool {
    Template::parse(source)
        .map(|t| t.has_field("q") && t.fields().all(|f| f == "q"))
        .unwrap_or(false)
}

fn parse_reflect_template(source: &str) -> Template {
    match Template::parse(source) {
        Ok(t) if t.has_field("q") && t.fields().all(|f| f == "q") => t,
        Ok(_) => {
            warn!(template = source, "reflect template must use only {{q}}, using default");
            default_reflect_template()
        }
        Err(e) => {
            warn!(error = %e, "unparsable reflect template, using default");
            default_reflect_template()
        }
    }
}

fn default_reflect_template() -> Template {
    Template::parse(DEFAULT_REFLECT_TEMPLATE).unwrap_or_else(|_| Template {
        segments: Vec::new(),
    })
}

/// One immutable, versioned view of everything the session recognises.
///
/// Operator edits never mutate a snapshot; they produce a new one with a
/// higher version which the session installs between turns.
#[derive(Debug, Clone)]
pub struct Lexicon {
    version: u64,
    phrases: PhraseTable,
    smalltalk: Vec<SmalltalkEntry>,
    reflect_template: Template,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Lexicon {
    /// Base phrases only, no small talk, default reflect template.
    pub fn builtin() -> Self {
        Self::from_phrasebook(&Phrasebook::default())
    }

    pub fn from_phrasebook(phrasebook: &Phrasebook) -> Self {
        Self {
            version: 0,
            phrases: merge(&base_phrases(), &phrasebook.intents),
            smalltalk: phrasebook.smalltalk.clone(),
            reflect_template: parse_reflect_template(&phrasebook.reflect_template),
        }
    }

    /// New snapshot with `additions` appended to the current phrases.
    pub fn with_additions(&self, additions: &IntentAdditions) -> Self {
        Self {
            version: self.version + 1,
            phrases: merge(&self.phrases, additions),
            smalltalk: self.smalltalk.clone(),
            reflect_template: self.reflect_template.clone(),
        }
    }

    /// New snapshot rebuilt from the base phrases and a replacement phrasebook.
    pub fn with_phrasebook(&self, phrasebook: &Phrasebook) -> Self {
        Self {
            version: self.version + 1,
            ..Self::from_phrasebook(phrasebook)
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Phrases for an intent; empty for unknown intents.
    pub fn phrases(&self, intent: &str) -> &[String] {
        self.phrases.get(intent).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_intent(&self, intent: &str) -> bool {
        self.phrases.contains_key(intent)
    }

    /// Response of the first small-talk entry with a pattern contained in
    /// the utterance.
    pub fn smalltalk_reply(&self, utterance: &str) -> Option<&str> {
        let text = normalize(utterance);
        if text.is_empty() {
            return None;
        }
        self.smalltalk
            .iter()
            .find(|entry| {
                entry.patterns.iter().any(|p| {
                    let p = normalize(p);
                    !p.is_empty() && text.contains(&p)
                })
            })
            .map(|entry| entry.response.as_str())
    }

    /// Echo a question back through the reflect template. `None` for blank input.
    pub fn reflect(&self, question: &str) -> Option<String> {
        let cleaned = question.trim();
        if cleaned.is_empty() {
            return None;
        }
        let q = if cleaned.ends_with('?') {
            cleaned.to_string()
        } else {
            format!("{}?", cleaned)
        };
        self.reflect_template
            .render(|field| (field == "q").then(|| q.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_table_covers_every_step_intent() {
        let table = base_phrases();
        for intent in crate::schema::step::all_required(&crate::schema::step::default_steps()) {
            assert!(
                table.get(intent).is_some_and(|p| !p.is_empty()),
                "missing base phrases for {}",
                intent
            );
        }
    }

    #[test]
    fn merge_appends_in_order_and_creates_buckets() {
        let mut base = PhraseTable::new();
        base.insert("ask_time".to_string(), vec!["appointment time".to_string()]);

        let mut additions = IntentAdditions::new();
        additions.insert(
            "ask_time".to_string(),
            vec!["  when do you start ".to_string(), "".to_string(), "appointment time".to_string()],
        );
        additions.insert("greet_back".to_string(), vec!["hello again".to_string()]);

        let merged = merge(&base, &additions);
        assert_eq!(
            merged["ask_time"],
            vec!["appointment time", "when do you start", "appointment time"]
        );
        assert_eq!(merged["greet_back"], vec!["hello again"]);
        // base untouched
        assert_eq!(base["ask_time"].len(), 1);
    }

    #[test]
    fn parse_json_phrasebook_tolerates_bad_entries() {
        let json = r#"{
            "smalltalk": [
                {"name": "greeting", "patterns": ["good morning", 7], "response": "Morning."},
                {"name": "broken", "patterns": [], "response": "never used"}
            ],
            "off_script": {"reflect_question_template": "You mean '{q}'?"},
            "intents": {"ask_time": ["when is it", {"x": 1}], "ask_host": 12}
        }"#;
        let pb = Phrasebook::parse_json(json).unwrap();
        assert_eq!(pb.smalltalk.len(), 1);
        assert_eq!(pb.smalltalk[0].patterns, vec!["good morning"]);
        assert_eq!(pb.reflect_template, "You mean '{q}'?");
        assert_eq!(pb.intents["ask_time"], vec!["when is it"]);
        assert!(!pb.intents.contains_key("ask_host"));
    }

    #[test]
    fn parse_ron_phrasebook() {
        let ron = r#"(
            smalltalk: [
                (name: "thanks", patterns: ["thank you"], response: "You're welcome."),
            ],
            off_script: (reflect_question_template: "Do you mean '{q}'?"),
            intents: {
                "ask_host": ["who invited you"],
            },
        )"#;
        let pb = Phrasebook::parse_ron(ron).unwrap();
        assert_eq!(pb.smalltalk[0].name, "thanks");
        assert_eq!(pb.intents["ask_host"], vec!["who invited you"]);
    }

    #[test]
    fn checked_parse_reports_dropped_entries() {
        let json = r#"{
            "smalltalk": [{"name": "mute", "patterns": ["hi", ""], "response": ""}],
            "intents": {"ask_time": ["when", 3], "ask_host": {"a": 1}}
        }"#;
        let (pb, issues) = Phrasebook::parse_json_checked(json).unwrap();
        assert!(pb.smalltalk.is_empty());
        assert_eq!(pb.reflect_template, DEFAULT_REFLECT_TEMPLATE);
        assert!(issues.contains(&PhrasebookIssue::DroppedPatterns {
            smalltalk: "mute".to_string(),
            count: 1
        }));
        assert!(issues.contains(&PhrasebookIssue::IncompleteSmalltalk("mute".to_string())));
        assert!(issues.contains(&PhrasebookIssue::DroppedPhrases {
            intent: "ask_time".to_string(),
            count: 1
        }));
        assert!(issues.contains(&PhrasebookIssue::IntentNotAList("ask_host".to_string())));
        assert!(issues.contains(&PhrasebookIssue::DefaultReflectTemplate));
    }

    #[test]
    fn reflect_template_given_as_plain_string() {
        let json = r#"{"off_script": "Did you say '{q}'?", "intents": {"ask_host": ["who invited you"]}}"#;
        let (pb, issues) = Phrasebook::parse_json_checked(json).unwrap();
        assert_eq!(pb.reflect_template, "Did you say '{q}'?");
        assert_eq!(pb.intents["ask_host"], vec!["who invited you"]);
        assert!(issues.is_empty());

        let ron = r#"(off_script: "Did you say '{q}'?", intents: {"ask_host": ["who invited you"]})"#;
        assert_eq!(Phrasebook::parse_ron(ron).unwrap().reflect_template, "Did you say '{q}'?");
    }

    #[test]
    fn wrong_shaped_sections_keep_the_rest() {
        let json = r#"{"smalltalk": null, "off_script": 5, "intents": {"ask_host": ["who invited you"]}}"#;
        let (pb, issues) = Phrasebook::parse_json_checked(json).unwrap();
        assert!(pb.smalltalk.is_empty());
        assert_eq!(pb.reflect_template, DEFAULT_REFLECT_TEMPLATE);
        assert_eq!(pb.intents["ask_host"], vec!["who invited you"]);
        assert!(issues.contains(&PhrasebookIssue::InvalidSection("smalltalk")));
        assert!(issues.contains(&PhrasebookIssue::InvalidSection("off_script")));

        let (pb, issues) = Phrasebook::parse_json_checked(r#"{"intents": ["who invited you"]}"#).unwrap();
        assert!(pb.intents.is_empty());
        assert!(issues.contains(&PhrasebookIssue::InvalidSection("intents")));
    }

    #[test]
    fn loose_smalltalk_fields() {
        let json = r#"{
            "smalltalk": [
                {"name": 7, "patterns": "lovely day", "response": "It is."},
                "just a string",
                {"name": "odd", "patterns": ["hi"], "response": 3}
            ],
            "intents": {"ask_host": ["who invited you"]}
        }"#;
        let (pb, issues) = Phrasebook::parse_json_checked(json).unwrap();
        assert_eq!(pb.smalltalk.len(), 1);
        assert_eq!(pb.smalltalk[0].name, "smalltalk");
        assert_eq!(pb.smalltalk[0].patterns, vec!["lovely day"]);
        assert_eq!(pb.intents["ask_host"], vec!["who invited you"]);
        assert!(issues.contains(&PhrasebookIssue::InvalidSmalltalk(1)));
        assert!(issues.contains(&PhrasebookIssue::IncompleteSmalltalk("odd".to_string())));
    }

    #[test]
    fn reflect_template_validity() {
        assert!(is_valid_reflect_template("You mean '{q}'?"));
        assert!(!is_valid_reflect_template("No placeholder"));
        assert!(!is_valid_reflect_template("{q} and {name}"));
        assert!(!is_valid_reflect_template("Broken {q"));
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let pb = Phrasebook::parse_json("{}").unwrap();
        assert_eq!(pb, Phrasebook::default());
    }

    #[test]
    fn syntax_errors_are_reported() {
        assert!(Phrasebook::parse_json("{ not json").is_err());
        assert!(Phrasebook::parse_ron("( smalltalk: [").is_err());
    }

    #[test]
    fn snapshot_versions_increase() {
        let base = Lexicon::builtin();
        assert_eq!(base.version(), 0);

        let mut additions = IntentAdditions::new();
        additions.insert("ask_host".to_string(), vec!["who invited you".to_string()]);
        let next = base.with_additions(&additions);
        assert_eq!(next.version(), 1);
        assert!(next.phrases("ask_host").iter().any(|p| p == "who invited you"));
        assert!(!base.phrases("ask_host").iter().any(|p| p == "who invited you"));

        let replaced = next.with_phrasebook(&Phrasebook::default());
        assert_eq!(replaced.version(), 2);
        assert!(!replaced.phrases("ask_host").iter().any(|p| p == "who invited you"));
    }

    #[test]
    fn smalltalk_matches_by_substring() {
        let pb = Phrasebook {
            smalltalk: vec![SmalltalkEntry {
                name: "weather".to_string(),
                patterns: vec!["Nice Weather".to_string()],
                response: "It is, isn't it?".to_string(),
            }],
            ..Phrasebook::default()
        };
        let lexicon = Lexicon::from_phrasebook(&pb);
        assert_eq!(lexicon.smalltalk_reply("Really nice   weather today"), Some("It is, isn't it?"));
        assert_eq!(lexicon.smalltalk_reply("what is your name"), None);
        assert_eq!(lexicon.smalltalk_reply(""), None);
    }

    #[test]
    fn reflect_appends_question_mark() {
        let lexicon = Lexicon::builtin();
        assert_eq!(
            lexicon.reflect("  where is the car park ").as_deref(),
            Some("Just to confirm: are you asking 'where is the car park?'?")
        );
        assert_eq!(
            lexicon.reflect("is it far?").as_deref(),
            Some("Just to confirm: are you asking 'is it far?'?")
        );
        assert_eq!(lexicon.reflect("   "), None);
    }

    #[test]
    fn bad_reflect_template_uses_default() {
        for tpl in ["No placeholder here", "Broken {q", "Other {field} and {q}"] {
            let pb = Phrasebook {
                reflect_template: tpl.to_string(),
                ..Phrasebook::default()
            };
            let lexicon = Lexicon::from_phrasebook(&pb);
            assert_eq!(
                lexicon.reflect("hi").as_deref(),
                Some("Just to confirm: are you asking 'hi?'?")
            );
        }
    }
}
