//! # Mapping Loader
//!
//! Reads the event/role dictionary (`mapping.json`) produced by the external
//! approval workflow and normalizes every key with [`canonical_key`].
//!
//! Two entry shapes are accepted per dictionary, matching what the workflow has
//! emitted over time:
//! - `"MARR": {"target": "Marriage"}` (legacy field name `tmg_name`) or `"MARR": "Marriage"`
//! - `"BUYER": {"primary": "Buyer", "secondary": "Acheteur"}` (legacy `eng`/`fra`) or `"BUYER": "Buyer"`

use crate::{canonical_key, title_case};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Errors from mapping loading. All of them are fatal for a run.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("mapping file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("malformed mapping file: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EventEntry {
    Name(String),
    Record {
        #[serde(default, alias = "tmg_name")]
        target: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RoleEntry {
    Label(String),
    Record {
        #[serde(default, alias = "eng")]
        primary: String,
        #[serde(default, alias = "fra")]
        secondary: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct MappingFile {
    #[serde(default)]
    events: HashMap<String, EventEntry>,
    #[serde(default)]
    roles: HashMap<String, RoleEntry>,
}

/// Display labels of a role in the two label languages of the target database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleLabels {
    pub primary: String,
    pub secondary: String,
}

impl RoleLabels {
    /// Labels derived from raw interchange text when the mapping has no entry.
    pub fn from_raw(raw: &str) -> Self {
        let label = title_case(raw.trim());
        Self {
            primary: label.clone(),
            secondary: label,
        }
    }
}

/// Normalized interchange event key → canonical target event-type name.
#[derive(Debug, Clone, Default)]
pub struct EventMapping {
    entries: HashMap<String, String>,
}

impl EventMapping {
    /// Target event-type name for a raw interchange key, if mapped.
    pub fn target(&self, raw: &str) -> Option<&str> {
        self.entries.get(&canonical_key(raw)).map(String::as_str)
    }

    /// Resolves raw event text to the normalized event-type key used by every stage:
    /// the mapped target name when present, otherwise the raw text, canonicalized.
    ///
    /// # Examples
    /// ```
    /// # use common::Mapping;
    /// let mapping = Mapping::from_json_str(r#"{"events": {"MARR": "Marriage"}}"#).unwrap();
    /// assert_eq!(mapping.events.event_key("marr"), "MARRIAGE");
    /// assert_eq!(mapping.events.event_key("Acte notarié"), "ACTE NOTARIE");
    /// ```
    pub fn event_key(&self, raw: &str) -> String {
        canonical_key(self.target(raw).unwrap_or(raw))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Normalized interchange role key → display labels.
#[derive(Debug, Clone, Default)]
pub struct RoleMapping {
    entries: HashMap<String, RoleLabels>,
}

impl RoleMapping {
    /// Labels for a raw role, falling back to the title-cased raw text.
    pub fn labels_for(&self, raw: &str) -> RoleLabels {
        self.entries
            .get(&canonical_key(raw))
            .cloned()
            .unwrap_or_else(|| RoleLabels::from_raw(raw))
    }

    pub fn get(&self, key: &str) -> Option<&RoleLabels> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The loaded dictionary. Immutable once built; stages borrow it.
#[derive(Debug, Clone, Default)]
pub struct Mapping {
    pub events: EventMapping,
    pub roles: RoleMapping,
}

impl Mapping {
    /// Loads and normalizes a mapping file.
    ///
    /// # Errors
    /// - [`MappingError::NotFound`] if `path` does not exist.
    /// - [`MappingError::Malformed`] if the JSON does not match either entry shape.
    pub fn load(path: &Path) -> Result<Self, MappingError> {
        if !path.exists() {
            return Err(MappingError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Parses a mapping document from a JSON string.
    pub fn from_json_str(content: &str) -> Result<Self, MappingError> {
        let file: MappingFile = serde_json::from_str(content)?;

        let mut events = HashMap::new();
        for (key, entry) in file.events {
            let target = match entry {
                EventEntry::Name(name) => name,
                EventEntry::Record { target } => target,
            };
            if !target.trim().is_empty() {
                events.insert(canonical_key(&key), target.trim().to_string());
            }
        }

        let mut roles = HashMap::new();
        for (key, entry) in file.roles {
            let (primary, secondary) = match entry {
                RoleEntry::Label(label) => (label, None),
                RoleEntry::Record { primary, secondary } => (primary, secondary),
            };
            let primary = primary.trim().to_string();
            if primary.is_empty() {
                continue;
            }
            let secondary = secondary
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| primary.clone());
            roles.insert(canonical_key(&key), RoleLabels { primary, secondary });
        }

        Ok(Self {
            events: EventMapping { entries: events },
            roles: RoleMapping { entries: roles },
        })
    }
}
