/// Progressive disclosure: which profile fields an intent exposes, and
/// the learner-visible projection of the visitor.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::schema::profile::{IdentityDocument, VisitorProfile};

/// A profile field that can be revealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProfileField {
    Name,
    Org,
    Purpose,
    Host,
    Topic,
    Time,
    /// The whole identity document, revealed atomically.
    IdDocument,
}

impl ProfileField {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Org => "org",
            Self::Purpose => "purpose",
            Self::Host => "host",
            Self::Topic => "topic",
            Self::Time => "time",
            Self::IdDocument => "id",
        }
    }
}

/// Fields exposed by each intent. Intents not listed reveal nothing.
const REVEAL_BY_INTENT: &[(&str, &[ProfileField])] = &[
    ("ask_identity", &[ProfileField::Name, ProfileField::Org]),
    ("ask_purpose", &[ProfileField::Purpose]),
    ("ask_host", &[ProfileField::Host]),
    ("ask_topic", &[ProfileField::Topic]),
    ("ask_time", &[ProfileField::Time]),
    ("request_id", &[ProfileField::IdDocument]),
];

pub fn fields_for(intent: &str) -> &'static [ProfileField] {
    REVEAL_BY_INTENT
        .iter()
        .find(|(name, _)| *name == intent)
        .map(|(_, fields)| *fields)
        .unwrap_or(&[])
}

/// A single value becoming observable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate {
    Name(String),
    Org(String),
    Purpose(String),
    Host(String),
    Topic(String),
    Time(String),
    IdDocument(IdentityDocument),
}

/// The updates `intent` produces for `profile`.
pub fn reveal(intent: &str, profile: &VisitorProfile) -> Vec<FieldUpdate> {
    fields_for(intent)
        .iter()
        .map(|field| match field {
            ProfileField::Name => FieldUpdate::Name(profile.name.clone()),
            ProfileField::Org => FieldUpdate::Org(profile.org.clone()),
            ProfileField::Purpose => FieldUpdate::Purpose(profile.purpose.clone()),
            ProfileField::Host => FieldUpdate::Host(profile.host.clone()),
            ProfileField::Topic => FieldUpdate::Topic(profile.topic.clone()),
            ProfileField::Time => FieldUpdate::Time(profile.time.clone()),
            ProfileField::IdDocument => FieldUpdate::IdDocument(profile.id.clone()),
        })
        .collect()
}

/// The revealed projection of a visitor. Fields only ever go from hidden
/// to revealed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedFields {
    pub name: Option<String>,
    pub org: Option<String>,
    pub purpose: Option<String>,
    pub host: Option<String>,
    pub topic: Option<String>,
    pub time: Option<String>,
    pub id: Option<IdentityDocument>,
}

fn set_once<T>(slot: &mut Option<T>, value: T) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(value);
    true
}

impl RevealedFields {
    /// Apply updates, keeping anything already revealed. Returns how many
    /// fields became visible.
    pub fn apply(&mut self, updates: Vec<FieldUpdate>) -> usize {
        updates
            .into_iter()
            .map(|update| match update {
                FieldUpdate::Name(v) => set_once(&mut self.name, v),
                FieldUpdate::Org(v) => set_once(&mut self.org, v),
                FieldUpdate::Purpose(v) => set_once(&mut self.purpose, v),
                FieldUpdate::Host(v) => set_once(&mut self.host, v),
                FieldUpdate::Topic(v) => set_once(&mut self.topic, v),
                FieldUpdate::Time(v) => set_once(&mut self.time, v),
                FieldUpdate::IdDocument(v) => set_once(&mut self.id, v),
            })
            .filter(|changed| *changed)
            .count()
    }

    pub fn is_revealed(&self, field: ProfileField) -> bool {
        match field {
            ProfileField::Name => self.name.is_some(),
            ProfileField::Org => self.org.is_some(),
            ProfileField::Purpose => self.purpose.is_some(),
            ProfileField::Host => self.host.is_some(),
            ProfileField::Topic => self.topic.is_some(),
            ProfileField::Time => self.time.is_some(),
            ProfileField::IdDocument => self.id.is_some(),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Revealed scalar fields as `(label, value)` pairs, in display order.
    pub fn summary(&self) -> Vec<(&'static str, &str)> {
        [
            (ProfileField::Name, &self.name),
            (ProfileField::Org, &self.org),
            (ProfileField::Purpose, &self.purpose),
            (ProfileField::Host, &self.host),
            (ProfileField::Topic, &self.topic),
            (ProfileField::Time, &self.time),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.as_deref().map(|v| (field.label(), v)))
        .collect()
    }

    /// The training ID card as the learner currently sees it.
    pub fn id_card(&self, today: NaiveDate) -> IdCardView {
        let hidden = || PLACEHOLDER.to_string();
        let id = self.id.as_ref();
        IdCardView {
            name: self.name.clone().unwrap_or_else(hidden),
            org: self.org.clone().unwrap_or_else(hidden),
            nationality: id.map(|d| d.nationality.clone()).unwrap_or_else(hidden),
            dob: id.map(|d| d.dob_display()).unwrap_or_else(hidden),
            age: id.map(|d| d.age_on(today).to_string()).unwrap_or_else(hidden),
            address: id.map(|d| d.address.clone()).unwrap_or_else(hidden),
            id_no: id.map(|d| d.id_no.clone()).unwrap_or_else(hidden),
            expiry: id.map(|d| d.expiry_display()).unwrap_or_else(hidden),
        }
    }
}

const PLACEHOLDER: &str = "—";

/// Text rendition of the fictional training ID card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdCardView {
    pub name: String,
    pub org: String,
    pub nationality: String,
    pub dob: String,
    pub age: String,
    pub address: String,
    pub id_no: String,
    pub expiry: String,
}

impl fmt::Display for IdCardView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "TRAINING ID CARD (fictional)")?;
        let rows = [
            ("Name", &self.name),
            ("Company", &self.org),
            ("Nationality", &self.nationality),
            ("Date of birth", &self.dob),
            ("Age", &self.age),
            ("Address", &self.address),
            ("ID No.", &self.id_no),
            ("Expiry", &self.expiry),
        ];
        for (label, value) in rows {
            writeln!(f, "  {:<14}{}", format!("{}:", label), value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::profile::{sample_profile, Twist};

    #[test]
    fn identity_reveals_name_and_org_only() {
        let profile = sample_profile(Twist::VagueTime);
        let mut revealed = RevealedFields::default();
        assert_eq!(revealed.apply(reveal("ask_identity", &profile)), 2);
        assert_eq!(revealed.name.as_deref(), Some("Sarah De Vries"));
        assert_eq!(revealed.org.as_deref(), Some("NorthRail"));
        assert!(!revealed.is_revealed(ProfileField::Purpose));
        assert!(!revealed.is_revealed(ProfileField::IdDocument));
    }

    #[test]
    fn id_request_reveals_whole_document() {
        let profile = sample_profile(Twist::VagueTime);
        let mut revealed = RevealedFields::default();
        revealed.apply(reveal("request_id", &profile));
        assert_eq!(revealed.id.as_ref(), Some(&profile.id));
        assert_eq!(revealed.summary(), Vec::<(&str, &str)>::new());
    }

    #[test]
    fn repeat_reveal_is_noop() {
        let profile = sample_profile(Twist::VagueTime);
        let mut revealed = RevealedFields::default();
        revealed.apply(reveal("ask_host", &profile));
        let snapshot = revealed.clone();
        assert_eq!(revealed.apply(reveal("ask_host", &profile)), 0);
        assert_eq!(revealed, snapshot);
    }

    #[test]
    fn unrevealing_is_impossible() {
        let profile = sample_profile(Twist::VagueTime);
        let mut revealed = RevealedFields::default();
        revealed.apply(reveal("ask_time", &profile));
        revealed.apply(vec![FieldUpdate::Time("changed".to_string())]);
        assert_eq!(revealed.time.as_deref(), Some("10:30"));
    }

    #[test]
    fn intents_without_fields_reveal_nothing() {
        let profile = sample_profile(Twist::VagueTime);
        assert!(reveal("contact_supervisor", &profile).is_empty());
        assert!(reveal("no_such_intent", &profile).is_empty());
    }

    #[test]
    fn id_card_hides_unrevealed_values() {
        let profile = sample_profile(Twist::VagueTime);
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let mut revealed = RevealedFields::default();
        let card = revealed.id_card(today);
        assert_eq!(card.name, "—");
        assert_eq!(card.id_no, "—");

        revealed.apply(reveal("request_id", &profile));
        let card = revealed.id_card(today);
        assert_eq!(card.name, "—");
        assert_eq!(card.age, "36");
        assert_eq!(card.dob, "15 Jun 1990");
        assert!(card.to_string().contains("ID-123456-78"));
    }

    #[test]
    fn summary_in_display_order() {
        let profile = sample_profile(Twist::VagueTime);
        let mut revealed = RevealedFields::default();
        revealed.apply(reveal("ask_time", &profile));
        revealed.apply(reveal("ask_identity", &profile));
        assert_eq!(
            revealed.summary(),
            vec![("name", "Sarah De Vries"), ("org", "NorthRail"), ("time", "10:30")]
        );
    }
}
