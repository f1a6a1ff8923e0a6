/// Scenario generation: value domains and the seeded visitor generator.

use chrono::{Local, Months, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::warn;

use crate::schema::profile::{IdentityDocument, Twist, VisitorProfile};

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("value domain '{0}' is empty")]
    EmptyDomain(&'static str),
    #[error("purpose '{0}' has no topics")]
    PurposeWithoutTopics(String),
}

/// A visit purpose and the only topics that are coherent with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurposeTopics {
    pub purpose: String,
    pub topics: Vec<String>,
}

/// Value domains the generator draws from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub first_names: Vec<String>,
    pub last_names: Vec<String>,
    pub organizations: Vec<String>,
    pub hosts: Vec<String>,
    pub times: Vec<String>,
    pub purposes: Vec<PurposeTopics>,
    pub twists: Vec<Twist>,
    pub nationalities: Vec<String>,
    pub streets: Vec<String>,
    pub cities: Vec<String>,
    pub postcodes: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        let purposes = [
            ("a delivery", ["equipment delivery", "spare parts delivery", "package delivery"]),
            ("maintenance work", ["network maintenance", "equipment repair", "HVAC maintenance"]),
            (
                "an inspection",
                ["fire safety inspection", "vehicle inspection", "safety compliance inspection"],
            ),
            ("a briefing", ["training coordination", "security briefing", "project briefing"]),
            ("a meeting", ["IT audit meeting", "contractor meeting", "planning meeting"]),
        ];

        Self {
            first_names: strings(&[
                "Mark", "Sarah", "James", "Nina", "Tom", "Aisha", "Lucas", "Emma", "Daan", "Sofia",
            ]),
            last_names: strings(&[
                "Jensen", "Bakker", "Williams", "De Vries", "Khan", "Smit", "Brown", "Visser",
                "Johnson", "Martens",
            ]),
            organizations: strings(&[
                "NetSecure BV",
                "NorthRail",
                "TriCom Systems",
                "BlueShield Contractors",
                "AeroTech Services",
                "MedLogistics",
            ]),
            hosts: strings(&[
                "Captain De Vries",
                "Lt. Van Dijk",
                "Major Jansen",
                "Sgt. De Boer",
                "Captain Smit",
            ]),
            times: strings(&["09:00", "10:30", "13:00", "14:30", "15:15"]),
            purposes: purposes
                .iter()
                .map(|(purpose, topics)| PurposeTopics {
                    purpose: purpose.to_string(),
                    topics: strings(topics),
                })
                .collect(),
            twists: Twist::ALL.to_vec(),
            nationalities: strings(&[
                "Dutch", "German", "Belgian", "British", "French", "Spanish", "Polish", "Italian",
            ]),
            streets: strings(&[
                "Oak Street",
                "Main Street",
                "Station Road",
                "Maple Avenue",
                "Church Lane",
                "Parkstraat",
                "Wilhelminastraat",
            ]),
            cities: strings(&["Ede", "Arnhem", "Utrecht", "Apeldoorn", "Zwolle", "Amersfoort"]),
            postcodes: strings(&["6711 AB", "6811 CD", "3511 EF", "7311 GH", "8011 JK", "3811 LM"]),
        }
    }
}

impl ScenarioConfig {
    pub fn load_from_ron(path: &Path) -> Result<ScenarioConfig, ScenarioError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse and validate a configuration from a RON string.
    pub fn parse_ron(input: &str) -> Result<ScenarioConfig, ScenarioError> {
        let config: ScenarioConfig = ron::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Every domain must be non-empty and every purpose must own a topic.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let domains: [(&'static str, bool); 11] = [
            ("first_names", self.first_names.is_empty()),
            ("last_names", self.last_names.is_empty()),
            ("organizations", self.organizations.is_empty()),
            ("hosts", self.hosts.is_empty()),
            ("times", self.times.is_empty()),
            ("purposes", self.purposes.is_empty()),
            ("twists", self.twists.is_empty()),
            ("nationalities", self.nationalities.is_empty()),
            ("streets", self.streets.is_empty()),
            ("cities", self.cities.is_empty()),
            ("postcodes", self.postcodes.is_empty()),
        ];
        if let Some((name, _)) = domains.iter().find(|(_, empty)| *empty) {
            return Err(ScenarioError::EmptyDomain(*name));
        }
        if let Some(p) = self.purposes.iter().find(|p| p.topics.is_empty()) {
            return Err(ScenarioError::PurposeWithoutTopics(p.purpose.clone()));
        }
        Ok(())
    }

    /// Topics coherent with `purpose`; empty for an unknown purpose.
    pub fn topics_for(&self, purpose: &str) -> &[String] {
        self.purposes
            .iter()
            .find(|p| p.purpose == purpose)
            .map(|p| p.topics.as_slice())
            .unwrap_or(&[])
    }
}

/// Seeded, re-entrant visitor generator over a validated configuration.
#[derive(Debug, Clone)]
pub struct ScenarioGenerator {
    config: ScenarioConfig,
}

impl Default for ScenarioGenerator {
    fn default() -> Self {
        Self {
            config: ScenarioConfig::default(),
        }
    }
}

fn pick<'a, T>(rng: &mut StdRng, items: &'a [T]) -> &'a T {
    &items[rng.gen_range(0..items.len())]
}

/// Uniform day in `[from, to]`; `from` when the range is inverted.
fn day_between(rng: &mut StdRng, from: NaiveDate, to: NaiveDate) -> NaiveDate {
    let span = (to - from).num_days();
    if span <= 0 {
        return from;
    }
    from + chrono::Duration::days(rng.gen_range(0..=span))
}

impl ScenarioGenerator {
    pub fn new(config: ScenarioConfig) -> Result<Self, ScenarioError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Generator over the RON configuration at `path`; an absent or invalid
    /// file falls back to the built-in value pools.
    pub fn load_or_default(path: &Path) -> Self {
        match ScenarioConfig::load_from_ron(path) {
            Ok(config) => Self { config },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "invalid scenario file, using built-in pools");
                Self::default()
            }
        }
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Generate a visitor relative to today's date.
    pub fn generate(&self, seed: u64) -> VisitorProfile {
        self.generate_on(seed, Local::now().date_naive())
    }

    /// Deterministic for a given `(seed, today)`.
    pub fn generate_on(&self, seed: u64, today: NaiveDate) -> VisitorProfile {
        let cfg = &self.config;
        let mut rng = StdRng::seed_from_u64(seed);

        let first = pick(&mut rng, &cfg.first_names);
        let last = pick(&mut rng, &cfg.last_names);
        let org = pick(&mut rng, &cfg.organizations).clone();
        let host = pick(&mut rng, &cfg.hosts).clone();

        let purpose = pick(&mut rng, &cfg.purposes);
        let topic = pick(&mut rng, &purpose.topics).clone();
        let time = pick(&mut rng, &cfg.times).clone();
        let twist = *pick(&mut rng, &cfg.twists);

        let oldest = today.checked_sub_months(Months::new(60 * 12)).unwrap_or(today);
        let youngest = today.checked_sub_months(Months::new(18 * 12)).unwrap_or(today);
        let dob = day_between(&mut rng, oldest, youngest);

        let nationality = pick(&mut rng, &cfg.nationalities).clone();
        let address = format!(
            "{} {}, {} {}",
            pick(&mut rng, &cfg.streets),
            rng.gen_range(1..=199),
            pick(&mut rng, &cfg.postcodes),
            pick(&mut rng, &cfg.cities),
        );
        let id_no = format!(
            "ID-{}-{}",
            rng.gen_range(100_000..=999_999),
            rng.gen_range(10..=99)
        );

        let soonest = today.checked_add_months(Months::new(12)).unwrap_or(today);
        let latest = today.checked_add_months(Months::new(8 * 12)).unwrap_or(today);
        let expiry = day_between(&mut rng, soonest, latest);

        VisitorProfile {
            name: format!("{} {}", first, last),
            org,
            host,
            purpose: purpose.purpose.clone(),
            topic,
            time,
            twist,
            id: IdentityDocument {
                id_no,
                dob,
                nationality,
                address,
                expiry,
            },
        }
    }
}
