//! Witness scan: one pass over the interchange text producing [`EventBlock`]s.
//!
//! The scanner tracks three levels of state:
//! - the current owning record (`0 @I…@ INDI` or `0 @F…@ FAM`);
//! - the current event (any level-1 tag under an owner);
//! - the current witness sub-block (`2 _SHAR @I…@`) with its `ROLE` and `NOTE`.
//!
//! ```text
//! 0 @I1@ INDI
//! 1 MARR
//! 2 DATE 12 MAY 1750
//! 2 _SHAR @I9@
//! 3 ROLE Buyer
//! 3 NOTE signed the deed
//! ```
//!
//! Family events are emitted once the whole record has been read, so `HUSB`/`WIFE`
//! pointers written after the events still reach the owner.

use crate::line::{lines, Line};
use common::EventMapping;

/// Role assigned to a `_SHAR` that carries no `ROLE` field.
pub const DEFAULT_ROLE: &str = "Witness";

/// Tag that opens a witness sub-block.
const SHARE_TAG: &str = "_SHAR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerKind {
    Individual,
    Family,
}

/// The record owning an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    /// Interchange record id without `@` (`I12`, `F3`).
    pub id: String,
    pub kind: OwnerKind,
    pub husband: Option<String>,
    pub wife: Option<String>,
}

impl Owner {
    fn new(id: &str, kind: OwnerKind) -> Self {
        Self {
            id: id.to_string(),
            kind,
            husband: None,
            wife: None,
        }
    }

    /// Interchange individual whose database events hold this owner's events:
    /// the individual itself, or for a family the husband, else the wife.
    pub fn person_id(&self) -> Option<&str> {
        match self.kind {
            OwnerKind::Individual => Some(&self.id),
            OwnerKind::Family => self.husband.as_deref().or(self.wife.as_deref()),
        }
    }
}

/// One `_SHAR` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WitnessRef {
    /// Interchange id of the witnessing individual.
    pub witness_id: String,
    /// Raw role text, [`DEFAULT_ROLE`] when the sub-block has none.
    pub role: String,
    pub note: String,
}

/// An event with at least one witness reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBlock {
    pub owner: Owner,
    /// Level-1 tag as written (`MARR`, `EVEN`).
    pub tag: String,
    /// Normalized event-type key (see [`EventMapping::event_key`]).
    pub event_key: String,
    /// Raw `DATE` value.
    pub date: Option<String>,
    pub witnesses: Vec<WitnessRef>,
}

impl EventBlock {
    /// A reference is self-referential when the witness is the owning record
    /// itself or, for a family, one of its spouses.
    pub fn is_self(&self, witness: &WitnessRef) -> bool {
        let id = witness.witness_id.as_str();
        id == self.owner.id
            || (self.owner.kind == OwnerKind::Family
                && (self.owner.husband.as_deref() == Some(id)
                    || self.owner.wife.as_deref() == Some(id)))
    }
}

/// Scanner configuration.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Tags whose event type is named by their `TYPE` field (or their own value).
    pub generic_tags: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            generic_tags: ["EVEN", "FACT", "OCCU"].map(String::from).to_vec(),
        }
    }
}

impl ScanOptions {
    fn is_generic(&self, tag: &str) -> bool {
        self.generic_tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// Event under construction. `key_source` is the raw text the event key derives from.
#[derive(Debug)]
struct OpenEvent {
    tag: String,
    generic: bool,
    key_source: String,
    date: Option<String>,
    witnesses: Vec<WitnessRef>,
}

struct Scanner<'a> {
    mapping: &'a EventMapping,
    options: &'a ScanOptions,
    blocks: Vec<EventBlock>,
    owner: Option<Owner>,
    /// Finished events of the current record, waiting for the owner to be complete.
    pending: Vec<OpenEvent>,
    event: Option<OpenEvent>,
    in_share: bool,
    in_note: bool,
}

impl<'a> Scanner<'a> {
    fn new(mapping: &'a EventMapping, options: &'a ScanOptions) -> Self {
        Self {
            mapping,
            options,
            blocks: Vec::new(),
            owner: None,
            pending: Vec::new(),
            event: None,
            in_share: false,
            in_note: false,
        }
    }

    fn feed(&mut self, line: Line<'_>) {
        match line.level {
            0 => self.open_record(line),
            1 => self.open_event(line),
            2 => self.event_field(line),
            3 => self.share_field(line),
            4 => self.note_continuation(line),
            _ => {}
        }
    }

    fn open_record(&mut self, line: Line<'_>) {
        self.close_record();
        self.owner = match (line.xref, line.tag) {
            (Some(id), "INDI") => Some(Owner::new(id, OwnerKind::Individual)),
            (Some(id), "FAM") => Some(Owner::new(id, OwnerKind::Family)),
            _ => None,
        };
    }

    fn open_event(&mut self, line: Line<'_>) {
        self.close_event();
        let Some(owner) = self.owner.as_mut() else {
            return;
        };

        if let (OwnerKind::Family, Some(id)) = (owner.kind, line.pointer()) {
            match line.tag {
                "HUSB" if owner.husband.is_none() => owner.husband = Some(id.to_string()),
                "WIFE" if owner.wife.is_none() => owner.wife = Some(id.to_string()),
                _ => {}
            }
        }

        let generic = self.options.is_generic(line.tag);
        let key_source = if generic && !line.value.is_empty() {
            line.value
        } else {
            line.tag
        };
        self.event = Some(OpenEvent {
            tag: line.tag.to_string(),
            generic,
            key_source: key_source.to_string(),
            date: None,
            witnesses: Vec::new(),
        });
    }

    fn event_field(&mut self, line: Line<'_>) {
        self.in_share = false;
        self.in_note = false;
        let Some(event) = self.event.as_mut() else {
            return;
        };
        match line.tag {
            "DATE" => event.date = Some(line.value.to_string()),
            "TYPE" if event.generic && !line.value.is_empty() => {
                event.key_source = line.value.to_string();
            }
            SHARE_TAG => {
                let id = line
                    .pointer()
                    .unwrap_or_else(|| line.value.trim_matches('@').trim());
                if id.is_empty() {
                    tracing::warn!(tag = %event.tag, "witness reference without an id ignored");
                    return;
                }
                event.witnesses.push(WitnessRef {
                    witness_id: id.to_string(),
                    role: DEFAULT_ROLE.to_string(),
                    note: String::new(),
                });
                self.in_share = true;
            }
            _ => {}
        }
    }

    fn share_field(&mut self, line: Line<'_>) {
        self.in_note = false;
        if !self.in_share {
            return;
        }
        let Some(witness) = self
            .event
            .as_mut()
            .and_then(|event| event.witnesses.last_mut())
        else {
            return;
        };
        match line.tag {
            "ROLE" if !line.value.is_empty() => witness.role = line.value.to_string(),
            "NOTE" => {
                if !witness.note.is_empty() && !line.value.is_empty() {
                    witness.note.push(' ');
                }
                witness.note.push_str(line.value);
                self.in_note = true;
            }
            _ => {}
        }
    }

    fn note_continuation(&mut self, line: Line<'_>) {
        if !self.in_note {
            return;
        }
        let Some(witness) = self
            .event
            .as_mut()
            .and_then(|event| event.witnesses.last_mut())
        else {
            return;
        };
        match line.tag {
            "CONC" => witness.note.push_str(line.value),
            "CONT" => {
                witness.note.push('\n');
                witness.note.push_str(line.value);
            }
            _ => {}
        }
    }

    fn close_event(&mut self) {
        self.in_share = false;
        self.in_note = false;
        if let Some(event) = self.event.take() {
            if !event.witnesses.is_empty() {
                self.pending.push(event);
            }
        }
    }

    fn close_record(&mut self) {
        self.close_event();
        let Some(owner) = self.owner.take() else {
            self.pending.clear();
            return;
        };
        for event in self.pending.drain(..) {
            self.blocks.push(EventBlock {
                owner: owner.clone(),
                event_key: self.mapping.event_key(&event.key_source),
                tag: event.tag,
                date: event.date,
                witnesses: event.witnesses,
            });
        }
    }

    fn finish(mut self) -> Vec<EventBlock> {
        self.close_record();
        self.blocks
    }
}

/// Scans decoded interchange text for events carrying witness references.
///
/// Blocks come out in file order; witnesses keep their order inside each block.
/// Events without any `_SHAR` are not reported.
///
/// # Examples
/// ```
/// # use common::Mapping;
/// # use gedcom::{scan, ScanOptions};
/// let mapping = Mapping::from_json_str(r#"{"events": {"MARR": "Marriage"}}"#).unwrap();
/// let text = "0 @I1@ INDI\n1 MARR\n2 _SHAR @I2@\n3 ROLE Buyer\n";
/// let blocks = scan(text, &mapping.events, &ScanOptions::default());
/// assert_eq!(blocks[0].event_key, "MARRIAGE");
/// assert_eq!(blocks[0].witnesses[0].role, "Buyer");
/// ```
pub fn scan(text: &str, mapping: &EventMapping, options: &ScanOptions) -> Vec<EventBlock> {
    let mut scanner = Scanner::new(mapping, options);
    for line in lines(text) {
        scanner.feed(line);
    }
    let blocks = scanner.finish();
    tracing::info!(
        events = blocks.len(),
        witnesses = blocks.iter().map(|b| b.witnesses.len()).sum::<usize>(),
        "interchange scan complete"
    );
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Mapping;

    fn mapping() -> Mapping {
        Mapping::from_json_str(
            r#"{"events": {"MARR": "Marriage", "Acte notarié": {"target": "Deed"}, "MARC": "Marriage Contract"}}"#,
        )
        .unwrap()
    }

    fn run(text: &str) -> Vec<EventBlock> {
        scan(text, &mapping().events, &ScanOptions::default())
    }

    #[test]
    fn test_individual_event_with_roles() {
        let blocks = run("0 @I1@ INDI\n\
             1 NAME Jean /Martin/\n\
             1 MARR\n\
             2 DATE 12 MAY 1750\n\
             2 _SHAR @I2@\n\
             3 ROLE Buyer\n\
             2 _SHAR @I1@\n\
             3 ROLE Buyer\n\
             2 _SHAR @I3@\n\
             1 BIRT\n\
             2 DATE 1720\n");
        assert_eq!(blocks.len(), 1);
        let block = &blocks[0];
        assert_eq!(block.owner.id, "I1");
        assert_eq!(block.tag, "MARR");
        assert_eq!(block.event_key, "MARRIAGE");
        assert_eq!(block.date.as_deref(), Some("12 MAY 1750"));
        let roles: Vec<&str> = block.witnesses.iter().map(|w| w.role.as_str()).collect();
        assert_eq!(roles, vec!["Buyer", "Buyer", DEFAULT_ROLE]);
        assert!(!block.is_self(&block.witnesses[0]));
        assert!(block.is_self(&block.witnesses[1]));
    }

    #[test]
    fn test_generic_tag_uses_type() {
        let blocks = run("0 @I1@ INDI\n\
             1 EVEN\n\
             2 TYPE Acte notarié\n\
             2 _SHAR @I2@\n\
             1 OCCU Notary\n\
             2 _SHAR @I3@\n\
             1 FACT\n\
             2 _SHAR @I4@\n");
        let keys: Vec<&str> = blocks.iter().map(|b| b.event_key.as_str()).collect();
        assert_eq!(keys, vec!["DEED", "NOTARY", "FACT"]);
    }

    #[test]
    fn test_non_generic_tag_ignores_type() {
        let blocks = run("0 @I1@ INDI\n1 MARC\n2 TYPE Something else\n2 _SHAR @I2@\n");
        assert_eq!(blocks[0].event_key, "MARRIAGE CONTRACT");
    }

    #[test]
    fn test_family_spouses_after_events() {
        let blocks = run("0 @F1@ FAM\n\
             1 MARR\n\
             2 _SHAR @I5@\n\
             1 HUSB @I1@\n\
             1 WIFE @I2@\n\
             0 @F2@ FAM\n\
             1 WIFE @I4@\n\
             1 MARR\n\
             2 _SHAR @I6@\n\
             0 TRLR\n");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].owner.kind, OwnerKind::Family);
        assert_eq!(blocks[0].owner.person_id(), Some("I1"));
        assert_eq!(blocks[1].owner.person_id(), Some("I4"));
    }

    #[test]
    fn test_spouse_witnessing_own_family_event_is_self() {
        let blocks = run("0 @F1@ FAM\n\
             1 MARR\n\
             2 _SHAR @I1@\n\
             2 _SHAR @I2@\n\
             2 _SHAR @I7@\n\
             1 HUSB @I1@\n\
             1 WIFE @I2@\n");
        let block = &blocks[0];
        let flags: Vec<bool> = block.witnesses.iter().map(|w| block.is_self(w)).collect();
        assert_eq!(flags, vec![true, true, false]);
    }

    #[test]
    fn test_note_with_continuations() {
        let blocks = run("0 @I1@ INDI\n\
             1 BAPM\n\
             2 _SHAR @I2@\n\
             3 NOTE godfather\n\
             4 CONC , uncle\n\
             4 CONT of the child\n\
             3 NOTE present\n\
             3 ROLE Godfather\n\
             4 CONC ignored\n");
        let witness = &blocks[0].witnesses[0];
        assert_eq!(witness.role, "Godfather");
        assert_eq!(witness.note, "godfather, uncle\nof the child present");
    }

    #[test]
    fn test_role_outside_share_ignored() {
        let blocks = run("0 @I1@ INDI\n\
             1 MARR\n\
             2 _SHAR @I2@\n\
             2 PLAC Paris\n\
             3 ROLE Mayor\n");
        assert_eq!(blocks[0].witnesses[0].role, DEFAULT_ROLE);
    }

    #[test]
    fn test_records_without_owner_ignored() {
        let blocks = run("0 HEAD\n1 MARR\n2 _SHAR @I2@\n0 @S1@ SOUR\n1 EVEN\n2 _SHAR @I3@\n");
        assert!(blocks.is_empty());
    }

    #[test]
    fn test_empty_pointer_skipped() {
        let blocks = run("0 @I1@ INDI\n1 MARR\n2 _SHAR @@\n3 ROLE Buyer\n");
        assert!(blocks.is_empty());
    }
}
