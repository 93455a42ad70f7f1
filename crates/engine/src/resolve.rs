//! Identity & event resolution over in-memory indexes.
//!
//! Each table is scanned once. Events are indexed under both participant slots
//! and each candidate list is ordered by event id, so matching is deterministic.

use gedcom::{stored_year, ReferenceCodes};
use std::collections::{HashMap, HashSet};
use store::{dataset_id, EventRow, PersonRow, WitnessRow};

/// Uniqueness key of a witness row: (event, person, normalized role code, principal).
pub type DedupKey = (u32, u32, String, bool);

/// Event candidate for a (person, event type) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub id: u32,
    pub year: Option<u16>,
    pub principal1: u32,
    pub principal2: Option<u32>,
}

impl Candidate {
    fn from_row(row: &EventRow) -> Self {
        Self {
            id: row.id,
            year: stored_year(&row.date),
            principal1: row.principal1,
            principal2: row.principal2.filter(|&p| p != 0),
        }
    }

    /// `true` when `person` occupies either participant slot.
    pub fn has_participant(&self, person: u32) -> bool {
        person != 0 && (self.principal1 == person || self.principal2 == Some(person))
    }

    /// Either side without a year matches anything.
    pub fn matches_year(&self, year: Option<u16>) -> bool {
        match (self.year, year) {
            (Some(stored), Some(wanted)) => stored == wanted,
            _ => true,
        }
    }
}

/// Indexes built once per run.
#[derive(Debug, Default)]
pub struct Indexes {
    /// Interchange individual id → person id.
    interchange: HashMap<String, u32>,
    events: HashMap<(u32, u32), Vec<Candidate>>,
    existing: HashSet<DedupKey>,
    max_sequence: HashMap<u32, u32>,
    /// Dataset id stamped on new rows.
    pub dataset: u32,
}

impl Indexes {
    pub fn build(
        persons: &[PersonRow],
        events: &[EventRow],
        witnesses: &[WitnessRow],
        codes: &ReferenceCodes,
    ) -> Self {
        let mut by_reference: HashMap<String, u32> = HashMap::with_capacity(persons.len());
        for person in persons {
            let reference = person.reference.text();
            if !reference.is_empty() {
                by_reference.entry(reference).or_insert(person.id);
            }
        }
        let interchange: HashMap<String, u32> = codes
            .iter()
            .filter_map(|(ged_id, code)| {
                by_reference
                    .get(code.trim())
                    .map(|&person| (ged_id.clone(), person))
            })
            .collect();

        let mut by_owner: HashMap<(u32, u32), Vec<Candidate>> = HashMap::new();
        for row in events {
            let candidate = Candidate::from_row(row);
            for person in row.participants().collect::<HashSet<_>>() {
                by_owner
                    .entry((person, row.event_type))
                    .or_default()
                    .push(candidate);
            }
        }
        for list in by_owner.values_mut() {
            list.sort_by_key(|c| c.id);
        }

        let mut existing = HashSet::with_capacity(witnesses.len());
        let mut max_sequence: HashMap<u32, u32> = HashMap::new();
        for row in witnesses {
            existing.insert((row.event, row.person, row.role_key(), row.primary));
            let max = max_sequence.entry(row.event).or_insert(0);
            *max = (*max).max(row.sequence);
        }

        tracing::info!(
            persons = by_reference.len(),
            mapped = interchange.len(),
            unmapped = codes.len() - interchange.len(),
            witnesses = existing.len(),
            "identity indexes built"
        );

        Self {
            interchange,
            events: by_owner,
            existing,
            max_sequence,
            dataset: dataset_id(persons),
        }
    }

    /// Person id of an interchange individual.
    pub fn person(&self, interchange_id: &str) -> Option<u32> {
        self.interchange.get(interchange_id).copied()
    }

    pub fn candidates(&self, person: u32, event_type: u32) -> &[Candidate] {
        self.events
            .get(&(person, event_type))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First candidate, by event id, whose year agrees with `year`.
    pub fn match_event(&self, person: u32, event_type: u32, year: Option<u16>) -> Option<&Candidate> {
        self.candidates(person, event_type)
            .iter()
            .find(|c| c.matches_year(year))
    }

    pub fn contains(&self, key: &DedupKey) -> bool {
        self.existing.contains(key)
    }

    pub fn next_sequence(&self, event: u32) -> u32 {
        self.max_sequence.get(&event).copied().unwrap_or(0) + 1
    }

    /// Registers a row that was just appended.
    pub fn record(&mut self, key: DedupKey, sequence: u32) {
        let max = self.max_sequence.entry(key.0).or_insert(0);
        *max = (*max).max(sequence);
        self.existing.insert(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Vec<T> {
        serde_json::from_value(value).unwrap()
    }

    fn indexes() -> Indexes {
        let persons: Vec<PersonRow> = rows(json!([
            {"id": 1, "reference": "10", "dataset": 3},
            {"id": 2, "reference": 20, "dataset": 3},
            {"id": 3, "reference": "", "dataset": 3},
        ]));
        let events: Vec<EventRow> = rows(json!([
            {"id": 200, "event_type": 7, "date": "117510101", "principal1": 1, "principal2": 2},
            {"id": 100, "event_type": 7, "date": "117500512", "principal1": 1, "principal2": 0},
            {"id": 300, "event_type": 7, "date": "", "principal1": 2},
        ]));
        let witnesses: Vec<WitnessRow> = rows(json!([
            {"event": 100, "person": 2, "sequence": 4, "role": 3, "primary": false},
            {"event": 100, "person": 1, "sequence": 2, "role": "00004", "primary": true},
        ]));
        let codes: ReferenceCodes = [("I1", "10"), ("I2", "20"), ("I9", "99")]
            .into_iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect();
        Indexes::build(&persons, &events, &witnesses, &codes)
    }

    #[test]
    fn test_interchange_ids_resolve_through_reference() {
        let idx = indexes();
        assert_eq!(idx.person("I1"), Some(1));
        assert_eq!(idx.person("I2"), Some(2));
        assert_eq!(idx.person("I9"), None);
        assert_eq!(idx.dataset, 3);
    }

    #[test]
    fn test_candidates_indexed_under_both_slots_and_sorted() {
        let idx = indexes();
        let ids: Vec<u32> = idx.candidates(1, 7).iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![100, 200]);
        let ids: Vec<u32> = idx.candidates(2, 7).iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![200, 300]);
        assert!(idx.candidates(1, 8).is_empty());
    }

    #[test]
    fn test_year_matching() {
        let idx = indexes();
        assert_eq!(idx.match_event(1, 7, Some(1751)).map(|c| c.id), Some(200));
        assert_eq!(idx.match_event(1, 7, None).map(|c| c.id), Some(100));
        assert!(idx.match_event(1, 7, Some(1749)).is_none());
        // Event 300 has no stored year and matches any year.
        assert_eq!(idx.match_event(2, 7, Some(1800)).map(|c| c.id), Some(300));
    }

    #[test]
    fn test_dedup_and_sequence() {
        let mut idx = indexes();
        assert!(idx.contains(&(100, 2, "00003".to_string(), false)));
        assert!(idx.contains(&(100, 1, "00004".to_string(), true)));
        assert!(!idx.contains(&(100, 1, "00004".to_string(), false)));
        assert_eq!(idx.next_sequence(100), 5);
        assert_eq!(idx.next_sequence(200), 1);

        idx.record((200, 1, "00003".to_string(), false), 1);
        assert_eq!(idx.next_sequence(200), 2);
        assert!(idx.contains(&(200, 1, "00003".to_string(), false)));
    }

    #[test]
    fn test_participant_check() {
        let idx = indexes();
        let event = &idx.candidates(1, 7)[1];
        assert!(event.has_participant(1));
        assert!(event.has_participant(2));
        assert!(!event.has_participant(3));
        assert!(!idx.candidates(1, 7)[0].has_participant(0));
    }
}
