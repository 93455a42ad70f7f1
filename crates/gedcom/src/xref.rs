//! Second pass: interchange individual id → cross-reference code.
//!
//! The export writes the database's own reference number as `1 REFN <code>`
//! under each individual. Only the first `REFN` of a record counts.

use crate::line::lines;
use std::collections::HashMap;

/// Interchange individual id (`I12`) → cross-reference code as written.
pub type ReferenceCodes = HashMap<String, String>;

/// Collects the first level-1 `REFN` of every individual record.
///
/// # Examples
/// ```
/// let codes = gedcom::reference_codes("0 @I1@ INDI\n1 REFN 42\n1 REFN 99\n");
/// assert_eq!(codes["I1"], "42");
/// ```
pub fn reference_codes(text: &str) -> ReferenceCodes {
    let mut codes = ReferenceCodes::new();
    let mut current: Option<&str> = None;

    for line in lines(text) {
        match line.level {
            0 => current = line.xref.filter(|_| line.tag == "INDI"),
            1 if line.tag == "REFN" => {
                if let Some(id) = current.take() {
                    if !line.value.is_empty() {
                        codes.insert(id.to_string(), line.value.to_string());
                    }
                }
            }
            _ => {}
        }
    }

    tracing::info!(individuals = codes.len(), "cross-reference codes collected");
    codes
}
