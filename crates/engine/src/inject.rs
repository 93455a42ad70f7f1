//! Witness injection.
//!
//! Every witness reference goes through, in order:
//! 1. witness identity (interchange id → person);
//! 2. owning event (event type, owner person, year-checked candidate);
//! 3. self check (witness occupies a participant slot of that event);
//! 4. role code selection with the witness-role and default-code fallbacks;
//! 5. duplicate check on (event, person, role code, principal);
//! 6. append with the event's next sequence number.
//!
//! Failures at steps 1–2 are counted per reason and never stop the run.

use crate::resolve::{Candidate, DedupKey, Indexes};
use crate::sync::{SchemaPlan, TypePlan};
use common::{canonical_key, RoleMapping, RoleVariant};
use gedcom::{interchange_year, EventBlock, WitnessRef};
use std::collections::BTreeMap;
use std::fmt;
use store::{StoreError, StoredValue, WitnessAppender, WitnessRow};

/// Destination of new witness rows.
///
/// The real run appends to the witness table; simulation collects into a `Vec`.
pub trait WitnessSink {
    fn append(&mut self, row: &WitnessRow) -> Result<(), StoreError>;
}

impl WitnessSink for WitnessAppender {
    fn append(&mut self, row: &WitnessRow) -> Result<(), StoreError> {
        WitnessAppender::append(self, row)
    }
}

impl WitnessSink for Vec<WitnessRow> {
    fn append(&mut self, row: &WitnessRow) -> Result<(), StoreError> {
        self.push(row.clone());
        Ok(())
    }
}

/// Why a reference could not be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FailureReason {
    UnresolvedWitness,
    UnknownEventType,
    UnresolvedOwner,
    NoMatchingEvent,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureReason::UnresolvedWitness => "unresolved witness",
            FailureReason::UnknownEventType => "unknown event type",
            FailureReason::UnresolvedOwner => "unresolved owner",
            FailureReason::NoMatchingEvent => "no matching event",
        };
        f.write_str(text)
    }
}

/// Result of one reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Injected(RoleVariant),
    Duplicate,
    Failed(FailureReason),
}

/// Run counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub injected_normal: usize,
    pub injected_principal: usize,
    pub skipped_duplicate: usize,
    pub errors: usize,
    pub failures: BTreeMap<FailureReason, usize>,
    /// Injected rows whose own role had no code.
    pub fallbacks: usize,
}

impl Tally {
    fn count(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Injected(RoleVariant::Normal) => self.injected_normal += 1,
            Outcome::Injected(RoleVariant::Principal) => self.injected_principal += 1,
            Outcome::Duplicate => self.skipped_duplicate += 1,
            Outcome::Failed(reason) => {
                self.errors += 1;
                *self.failures.entry(reason).or_default() += 1;
            }
        }
    }

    pub fn injected(&self) -> usize {
        self.injected_normal + self.injected_principal
    }

    pub fn failures_for(&self, reason: FailureReason) -> usize {
        self.failures.get(&reason).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct InjectOptions {
    pub default_role_code: u32,
    pub note_capacity: usize,
    /// Normalized key of the generic witness role.
    pub witness_role: String,
}

/// Chosen code and whether it came from a fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CodeChoice {
    code: u32,
    fallback: bool,
}

/// Event resolved for one block.
#[derive(Debug, Clone, Copy)]
struct Target<'p> {
    candidate: Candidate,
    type_plan: Option<&'p TypePlan>,
}

struct Injector<'a, S: WitnessSink + ?Sized> {
    plan: &'a SchemaPlan,
    roles: &'a RoleMapping,
    indexes: &'a mut Indexes,
    options: &'a InjectOptions,
    sink: &'a mut S,
    tally: Tally,
}

impl<'a, S: WitnessSink + ?Sized> Injector<'a, S> {
    fn block(&mut self, block: &EventBlock) -> Result<(), StoreError> {
        let target = self.resolve_target(block);
        for witness in &block.witnesses {
            let outcome = self.reference(block, witness, target)?;
            self.tally.count(outcome);
        }
        Ok(())
    }

    /// Step 2, shared by every witness of the block.
    fn resolve_target(&self, block: &EventBlock) -> Result<Target<'a>, FailureReason> {
        let event_type = self
            .plan
            .event_type_id(&block.event_key)
            .ok_or(FailureReason::UnknownEventType)?;
        let owner = block
            .owner
            .person_id()
            .and_then(|id| self.indexes.person(id))
            .ok_or(FailureReason::UnresolvedOwner)?;
        let year = block.date.as_deref().and_then(interchange_year);
        let candidate = self
            .indexes
            .match_event(owner, event_type, year)
            .ok_or(FailureReason::NoMatchingEvent)?;
        Ok(Target {
            candidate: *candidate,
            type_plan: self.plan.type_plan(event_type),
        })
    }

    fn reference(
        &mut self,
        block: &EventBlock,
        witness: &WitnessRef,
        target: Result<Target<'a>, FailureReason>,
    ) -> Result<Outcome, StoreError> {
        let Some(person) = self.indexes.person(&witness.witness_id) else {
            tracing::debug!(
                owner = %block.owner.id,
                witness = %witness.witness_id,
                "witness has no matching person"
            );
            return Ok(Outcome::Failed(FailureReason::UnresolvedWitness));
        };
        let target = match target {
            Ok(target) => target,
            Err(reason) => {
                tracing::debug!(
                    owner = %block.owner.id,
                    event = %block.event_key,
                    date = block.date.as_deref().unwrap_or(""),
                    %reason,
                    "event not resolved"
                );
                return Ok(Outcome::Failed(reason));
            }
        };

        let is_self = target.candidate.has_participant(person);
        let variant = RoleVariant::for_self(is_self);
        let role_key = canonical_key(&witness.role);
        let choice = self.select_code(target.type_plan, &role_key, variant);

        let key: DedupKey = (target.candidate.id, person, format!("{:05}", choice.code), is_self);
        if self.indexes.contains(&key) {
            tracing::debug!(
                event = target.candidate.id,
                person,
                code = choice.code,
                %variant,
                "already present, skipped"
            );
            return Ok(Outcome::Duplicate);
        }

        let mut note = witness.note.trim().to_string();
        if choice.fallback {
            let labels = self.roles.labels_for(&witness.role);
            note = format!("[{}] {}", labels.primary, note);
            self.tally.fallbacks += 1;
        }
        truncate_chars(&mut note, self.options.note_capacity);

        let sequence = self.indexes.next_sequence(target.candidate.id);
        let row = WitnessRow {
            event: target.candidate.id,
            person,
            dataset: self.indexes.dataset,
            sequence,
            role: StoredValue::code(choice.code),
            primary: is_self,
            note,
            extra: Default::default(),
        };
        self.sink.append(&row)?;
        self.indexes.record(key, sequence);

        tracing::debug!(
            event = target.candidate.id,
            person,
            role = %witness.role,
            code = choice.code,
            %variant,
            sequence,
            fallback = choice.fallback,
            "witness injected"
        );
        Ok(Outcome::Injected(variant))
    }

    /// Own role code for the variant; else the witness role (same variant first,
    /// then the other); else the configured default.
    fn select_code(
        &self,
        type_plan: Option<&TypePlan>,
        role_key: &str,
        variant: RoleVariant,
    ) -> CodeChoice {
        if let Some(code) = type_plan.and_then(|p| p.code(role_key, variant)) {
            return CodeChoice {
                code,
                fallback: false,
            };
        }
        let witness_key = self.options.witness_role.as_str();
        let fallback = type_plan.and_then(|p| {
            [variant, variant.other()].into_iter().find_map(|v| {
                p.code(witness_key, v)
                    .or_else(|| p.code_for_label(&v.label(witness_key)))
            })
        });
        CodeChoice {
            code: fallback.unwrap_or(self.options.default_role_code),
            fallback: true,
        }
    }
}

fn truncate_chars(text: &mut String, capacity: usize) {
    if let Some((index, _)) = text.char_indices().nth(capacity) {
        text.truncate(index);
    }
}

/// Injects every witness reference of `blocks`, in file order.
///
/// # Errors
/// Only a failing `sink` aborts; per-reference failures are counted in the [`Tally`].
pub fn inject<S: WitnessSink + ?Sized>(
    blocks: &[EventBlock],
    plan: &SchemaPlan,
    roles: &RoleMapping,
    indexes: &mut Indexes,
    options: &InjectOptions,
    sink: &mut S,
) -> Result<Tally, StoreError> {
    let mut injector = Injector {
        plan,
        roles,
        indexes,
        options,
        sink,
        tally: Tally::default(),
    };
    for block in blocks {
        injector.block(block)?;
    }
    let tally = injector.tally;
    tracing::info!(
        normal = tally.injected_normal,
        principal = tally.injected_principal,
        skipped = tally.skipped_duplicate,
        errors = tally.errors,
        "injection complete"
    );
    Ok(tally)
}
