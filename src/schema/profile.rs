use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Display format used on the training ID card, e.g. "07 Mar 1988".
pub const DATE_FORMAT: &str = "%d %b %Y";

/// The single behavioural modifier attached to a generated visitor.
///
/// A twist only alters the canned replies keyed to it; everything else
/// about the visitor behaves identically across twists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Twist {
    VagueTime,
    NoAppointment,
    Annoyed,
    TypoName,
    SharpObject,
    Alcohol,
}

impl Twist {
    pub const ALL: [Twist; 6] = [
        Self::VagueTime,
        Self::NoAppointment,
        Self::Annoyed,
        Self::TypoName,
        Self::SharpObject,
        Self::Alcohol,
    ];

    /// Returns the tag string for this twist (e.g., "vague_time").
    pub fn tag(&self) -> &'static str {
        match self {
            Self::VagueTime => "vague_time",
            Self::NoAppointment => "no_appointment",
            Self::Annoyed => "annoyed",
            Self::TypoName => "typo_name",
            Self::SharpObject => "sharp_object",
            Self::Alcohol => "alcohol",
        }
    }

    /// Instructor-facing description of what the twist does.
    pub fn description(&self) -> &'static str {
        match self {
            Self::VagueTime => "The visitor is vague about the appointment time unless asked clearly.",
            Self::NoAppointment => {
                "The visitor says they have no appointment (requires escalation mindset)."
            }
            Self::Annoyed => "The visitor is annoyed and short in responses.",
            Self::TypoName => {
                "The visitor gives a name that is easy to misspell; student should confirm spelling."
            }
            Self::SharpObject => {
                "The visitor has a small sharp object (e.g., pocket knife) and must surrender it."
            }
            Self::Alcohol => "The visitor has alcohol in a bag and must surrender it.",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Twist> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }
}

/// The synthetic identity document carried by the visitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityDocument {
    pub id_no: String,
    pub dob: NaiveDate,
    pub nationality: String,
    pub address: String,
    pub expiry: NaiveDate,
}

impl IdentityDocument {
    pub fn dob_display(&self) -> String {
        self.dob.format(DATE_FORMAT).to_string()
    }

    pub fn expiry_display(&self) -> String {
        self.expiry.format(DATE_FORMAT).to_string()
    }

    /// Age in whole years on the given day.
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        let mut age = today.year() - self.dob.year();
        if (today.month(), today.day()) < (self.dob.month(), self.dob.day()) {
            age -= 1;
        }
        age.max(0) as u32
    }

    /// Postcode part of an address shaped like "Oak Street 12, 6711 AB Ede".
    pub fn postcode(&self) -> Option<String> {
        let (_, rest) = self.address.split_once(',')?;
        let parts: Vec<&str> = rest.split_whitespace().collect();
        if parts.len() >= 2 {
            Some(format!("{} {}", parts[0], parts[1]))
        } else {
            None
        }
    }
}

/// A generated visitor. Created once per run and never mutated; a new run
/// regenerates the profile from a fresh seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorProfile {
    pub name: String,
    pub org: String,
    pub host: String,
    pub purpose: String,
    pub topic: String,
    pub time: String,
    pub twist: Twist,
    pub id: IdentityDocument,
}

impl VisitorProfile {
    pub fn first_name(&self) -> &str {
        self.name.split_once(' ').map_or(self.name.as_str(), |(first, _)| first)
    }

    /// Everything after the first name, so "De Vries" stays intact.
    pub fn last_name(&self) -> &str {
        self.name.split_once(' ').map_or("", |(_, last)| last)
    }

    /// The full name spelled letter by letter: "M-a-r-k-J-e-n-s-e-n".
    pub fn spelled_name(&self) -> String {
        spell(&self.name)
    }

    pub fn spelled_last_name(&self) -> String {
        spell(self.last_name())
    }
}

fn spell(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .map(String::from)
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
pub(crate) fn sample_profile(twist: Twist) -> VisitorProfile {
    VisitorProfile {
        name: "Sarah De Vries".to_string(),
        org: "NorthRail".to_string(),
        host: "Major Jansen".to_string(),
        purpose: "a delivery".to_string(),
        topic: "package delivery".to_string(),
        time: "10:30".to_string(),
        twist,
        id: IdentityDocument {
            id_no: "ID-123456-78".to_string(),
            dob: NaiveDate::from_ymd_opt(1990, 6, 15).unwrap(),
            nationality: "Dutch".to_string(),
            address: "Station Road 12, 6711 AB Ede".to_string(),
            expiry: NaiveDate::from_ymd_opt(2030, 1, 3).unwrap(),
        },
    }
}
