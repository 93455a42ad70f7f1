//! Run configuration.

use std::fmt;
use std::path::PathBuf;

/// How role usage flags are aggregated before code allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassificationScope {
    /// A role used as principal anywhere gets a PRINCIPAL code in every event
    /// type it appears in.
    #[default]
    Global,
    /// Flags are taken from the role's usage within each event type only.
    PerEventType,
}

impl fmt::Display for ClassificationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassificationScope::Global => f.write_str("global"),
            ClassificationScope::PerEventType => f.write_str("per-event-type"),
        }
    }
}

/// Language tags of the two labels written for each new role code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Languages {
    pub primary: String,
    pub secondary: String,
}

impl Default for Languages {
    fn default() -> Self {
        Self {
            primary: "ENGLISH".to_string(),
            secondary: "FRENCH".to_string(),
        }
    }
}

/// Everything one run needs. Built by the CLI, read by every stage.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub interchange: PathBuf,
    pub mapping: PathBuf,
    pub database: PathBuf,
    /// Table prefix; detected from the directory when `None`.
    pub prefix: Option<String>,
    /// Disambiguates prefix detection when several projects share a directory.
    pub prefix_hint: Option<String>,
    /// Compute everything, write nothing.
    pub simulate: bool,
    pub scope: ClassificationScope,
    /// Code used when neither the role nor the witness role has one.
    pub default_role_code: u32,
    pub languages: Languages,
    /// Maximum note length in characters.
    pub note_capacity: usize,
    /// Normalized key of the generic witness role used as fallback.
    pub witness_role: String,
    pub generic_tags: Vec<String>,
}

impl RunConfig {
    pub const DEFAULT_ROLE_CODE: u32 = 2;
    pub const NOTE_CAPACITY: usize = 60_000;

    /// A configuration with default settings for the three input paths.
    pub fn new(
        interchange: impl Into<PathBuf>,
        mapping: impl Into<PathBuf>,
        database: impl Into<PathBuf>,
    ) -> Self {
        Self {
            interchange: interchange.into(),
            mapping: mapping.into(),
            database: database.into(),
            prefix: None,
            prefix_hint: None,
            simulate: false,
            scope: ClassificationScope::default(),
            default_role_code: Self::DEFAULT_ROLE_CODE,
            languages: Languages::default(),
            note_capacity: Self::NOTE_CAPACITY,
            witness_role: "WITNESS".to_string(),
            generic_tags: gedcom::ScanOptions::default().generic_tags,
        }
    }

    pub fn scan_options(&self) -> gedcom::ScanOptions {
        gedcom::ScanOptions {
            generic_tags: self.generic_tags.clone(),
        }
    }
}
