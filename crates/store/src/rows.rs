//! Row types of the four tables.
//!
//! Every row keeps the columns it does not model in `extra`, so a read → write
//! cycle never drops data written by the host application.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A column that the host application writes either as a number or as text
/// (`3`, `"3"`, `"00003"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Number(i64),
    Text(String),
}

impl Default for StoredValue {
    fn default() -> Self {
        StoredValue::Text(String::new())
    }
}

impl StoredValue {
    /// Numeric value, accepting zero-padded digit strings.
    ///
    /// # Examples
    /// ```
    /// # use store::StoredValue;
    /// assert_eq!(StoredValue::Text(" 00003".into()).as_u32(), Some(3));
    /// assert_eq!(StoredValue::Number(3).as_u32(), Some(3));
    /// assert_eq!(StoredValue::Text("W".into()).as_u32(), None);
    /// ```
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            StoredValue::Number(n) => u32::try_from(*n).ok(),
            StoredValue::Text(s) => {
                let s = s.trim();
                if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                s.parse().ok()
            }
        }
    }

    /// Trimmed textual form.
    pub fn text(&self) -> String {
        match self {
            StoredValue::Number(n) => n.to_string(),
            StoredValue::Text(s) => s.trim().to_string(),
        }
    }

    /// Role code in the storage form used for new rows (`"00003"`).
    pub fn code(code: u32) -> Self {
        StoredValue::Text(format!("{code:05}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonRow {
    pub id: u32,
    /// Cross-reference code, the value exported as `REFN`.
    #[serde(default)]
    pub reference: StoredValue,
    #[serde(default)]
    pub dataset: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    pub id: u32,
    pub event_type: u32,
    /// Sortable stored date, see `gedcom::stored_year`.
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub principal1: u32,
    #[serde(default)]
    pub principal2: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EventRow {
    /// Non-zero participant ids, first slot first.
    pub fn participants(&self) -> impl Iterator<Item = u32> {
        [Some(self.principal1), self.principal2]
            .into_iter()
            .flatten()
            .filter(|&id| id != 0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTypeRow {
    pub id: u32,
    pub name: String,
    /// Full role grammar text (label section plus phrase templates).
    #[serde(default)]
    pub grammar: String,
    #[serde(default)]
    pub principal_capable: bool,
    #[serde(default)]
    pub witness_capable: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WitnessRow {
    pub event: u32,
    pub person: u32,
    #[serde(default)]
    pub dataset: u32,
    #[serde(default)]
    pub sequence: u32,
    #[serde(default)]
    pub role: StoredValue,
    /// Set when the witness is the event's own participant.
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub note: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WitnessRow {
    /// Role code normalized for comparison: `3`, `"3"` and `"00003"` all give `"00003"`.
    pub fn role_key(&self) -> String {
        match self.role.as_u32() {
            Some(code) => format!("{code:05}"),
            None => self.role.text(),
        }
    }
}

/// Dataset id stamped on new rows: the first positive dataset of the person table, else `1`.
pub fn dataset_id(persons: &[PersonRow]) -> u32 {
    persons
        .iter()
        .map(|p| p.dataset)
        .find(|&d| d > 0)
        .unwrap_or(1)
}
