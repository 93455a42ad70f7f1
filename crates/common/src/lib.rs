//! # Common: Shared Vocabulary for the Role Injector
//!
//! **Core Types**:
//! - [`Mapping`]: the event/role dictionary produced by the external approval workflow.
//! - [`RoleGrammar`]: the label section embedded in an event-type record.
//! - [`RoleVariant`]: NORMAL (third-party witness) or PRINCIPAL (self-witness).
//!
//! Every lookup key in the workspace goes through [`canonical_key`] so that the
//! mapping file, the interchange file and the database agree on identity.

pub mod grammar;
pub mod mapping;

pub use grammar::{GrammarError, LabelEntry, RoleGrammar};
pub use mapping::{EventMapping, Mapping, MappingError, RoleLabels, RoleMapping};

use std::fmt;
use unicode_normalization::UnicodeNormalization;

/// Label prefix distinguishing the PRINCIPAL variant of a role (`"Principal Buyer"`).
pub const PRINCIPAL_PREFIX: &str = "Principal ";

/// Canonicalizes free text into a lookup key.
///
/// Unicode-decomposes (NFKD), drops everything outside ASCII, upper-cases and trims.
///
/// # Examples
/// ```
/// # use common::canonical_key;
/// assert_eq!(canonical_key("  Témoin "), "TEMOIN");
/// assert_eq!(canonical_key("Acte notarié"), "ACTE NOTARIE");
/// assert_eq!(canonical_key(""), "");
/// ```
pub fn canonical_key(text: &str) -> String {
    let ascii: String = text.nfkd().filter(char::is_ascii).collect();
    ascii.trim().to_ascii_uppercase()
}

/// Title-cases text the way the mapping workflow labels unmapped roles:
/// the first letter of every alphabetic run is upper-cased, the rest lower-cased.
///
/// # Examples
/// ```
/// # use common::title_case;
/// assert_eq!(title_case("GODFATHER"), "Godfather");
/// assert_eq!(title_case("next of kin"), "Next Of Kin");
/// ```
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

/// Which flavour of a role a code stands for inside one event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoleVariant {
    /// Third-party witness (`"Buyer"`).
    Normal,
    /// The event's own participant acting in the role (`"Principal Buyer"`).
    Principal,
}

impl RoleVariant {
    /// Variant matching a self/third-party decision.
    pub fn for_self(is_self: bool) -> Self {
        if is_self {
            RoleVariant::Principal
        } else {
            RoleVariant::Normal
        }
    }

    /// The opposite variant, used as the second fallback choice.
    pub fn other(self) -> Self {
        match self {
            RoleVariant::Normal => RoleVariant::Principal,
            RoleVariant::Principal => RoleVariant::Normal,
        }
    }

    /// Applies the variant to a base label.
    pub fn label(self, base: &str) -> String {
        match self {
            RoleVariant::Normal => base.to_string(),
            RoleVariant::Principal => format!("{PRINCIPAL_PREFIX}{base}"),
        }
    }
}

impl fmt::Display for RoleVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleVariant::Normal => f.write_str("NORMAL"),
            RoleVariant::Principal => f.write_str("PRINCIPAL"),
        }
    }
}
