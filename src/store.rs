// CrashGuard - Configuration & Profile Stores
//
// The companion app owns both records; the engine only reads them.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::config::{Configuration, MAX_EMERGENCY_CONTACTS};
use crate::error::ConfigError;

pub trait ConfigStore: Send + Sync {
    fn load(&self) -> anyhow::Result<Configuration>;
}

pub trait ProfileStore: Send + Sync {
    /// `Ok(None)` when the user never completed onboarding.
    fn load(&self) -> anyhow::Result<Option<EmergencyProfile>>;
}

// ---------------------------------------------------------------------------
// Emergency Profile
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmergencyProfile {
    pub name: String,
    pub surname: String,
    pub birth_year: String,
    pub blood_type: String,
    pub health_notes: String,
    /// At most [`MAX_EMERGENCY_CONTACTS`], in the order the user entered them.
    pub contacts: Vec<String>,
}

impl EmergencyProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.surname).trim().to_string()
    }
}

/// Row shape of the companion app's `emergency_profile` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileRecord {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub birth_year: Option<BirthYear>,
    pub blood_type: Option<String>,
    pub health_notes: Option<String>,
    /// Comma-joined phone numbers.
    pub emergency_contacts: Option<String>,
}

/// Stored as INTEGER by the app, but older records carry the raw form text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BirthYear {
    Number(i64),
    Text(String),
}

impl ProfileRecord {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }
}

impl From<ProfileRecord> for EmergencyProfile {
    fn from(record: ProfileRecord) -> Self {
        let birth_year = match record.birth_year {
            Some(BirthYear::Number(year)) => year.to_string(),
            Some(BirthYear::Text(text)) => text.trim().to_string(),
            None => String::new(),
        };

        Self {
            name: record.name.unwrap_or_default().trim().to_string(),
            surname: record.surname.unwrap_or_default().trim().to_string(),
            birth_year,
            blood_type: record.blood_type.unwrap_or_default(),
            health_notes: record.health_notes.unwrap_or_default(),
            contacts: parse_contacts(record.emergency_contacts.as_deref().unwrap_or("")),
        }
    }
}

/// Split a comma-joined contact list: trimmed, non-empty, unique, first three.
pub fn parse_contacts(joined: &str) -> Vec<String> {
    let mut contacts: Vec<String> = Vec::with_capacity(MAX_EMERGENCY_CONTACTS);
    for number in joined.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if contacts.len() == MAX_EMERGENCY_CONTACTS {
            break;
        }
        if !contacts.iter().any(|c| c == number) {
            contacts.push(number.to_string());
        }
    }
    contacts
}

// ---------------------------------------------------------------------------
// In-memory stores (host builds, tests)
// ---------------------------------------------------------------------------
#[derive(Debug, Default)]
pub struct MemoryConfigStore(Mutex<Configuration>);

impl MemoryConfigStore {
    pub fn new(config: Configuration) -> Self {
        Self(Mutex::new(config))
    }

    pub fn set(&self, config: Configuration) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = config;
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> anyhow::Result<Configuration> {
        Ok(self.0.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }
}

#[derive(Debug, Default)]
pub struct MemoryProfileStore(Mutex<Option<EmergencyProfile>>);

impl MemoryProfileStore {
    pub fn new(profile: Option<EmergencyProfile>) -> Self {
        Self(Mutex::new(profile))
    }
}

impl ProfileStore for MemoryProfileStore {
    fn load(&self) -> anyhow::Result<Option<EmergencyProfile>> {
        Ok(self.0.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }
}
