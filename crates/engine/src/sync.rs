//! Schema synchronization: make every event type's role grammar carry the codes
//! the scan needs.
//!
//! For each event-type record, in table order, and each role used in it (sorted
//! by key), the NORMAL variant is looked up by its base label and the PRINCIPAL
//! variant by `"Principal " + base label`. Missing ones are appended with code
//! `max + 1`. A newly allocated label is indexed at once, so two roles sharing a
//! label share its code.
//!
//! A grammar that fails to parse is never rewritten: its type gets no codes and
//! its witnesses fall back to the witness role or the default code.

use crate::classify::RoleUsageMap;
use crate::config::{ClassificationScope, Languages};
use common::{canonical_key, RoleGrammar, RoleVariant};
use std::collections::{BTreeMap, HashMap};
use store::EventTypeRow;

/// Codes of one role inside one event type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleCodes {
    pub normal: Option<u32>,
    pub principal: Option<u32>,
}

impl RoleCodes {
    pub fn get(&self, variant: RoleVariant) -> Option<u32> {
        match variant {
            RoleVariant::Normal => self.normal,
            RoleVariant::Principal => self.principal,
        }
    }

    fn set(&mut self, variant: RoleVariant, code: u32) {
        match variant {
            RoleVariant::Normal => self.normal = Some(code),
            RoleVariant::Principal => self.principal = Some(code),
        }
    }
}

/// Synchronized view of one event type.
#[derive(Debug, Clone, Default)]
pub struct TypePlan {
    /// Role key → codes, for every role the scan uses in this type.
    pub roles: BTreeMap<String, RoleCodes>,
    /// Canonical label → code over the final grammar, for fallback lookups.
    pub labels: HashMap<String, u32>,
}

impl TypePlan {
    pub fn code(&self, role_key: &str, variant: RoleVariant) -> Option<u32> {
        self.roles.get(role_key).and_then(|codes| codes.get(variant))
    }

    pub fn code_for_label(&self, label: &str) -> Option<u32> {
        self.labels.get(&canonical_key(label)).copied()
    }
}

/// What the synchronizer changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaReport {
    pub event_types: usize,
    pub types_modified: usize,
    pub codes_created: usize,
    pub malformed_grammars: usize,
}

/// Output of [`synchronize`]; immutable once built.
#[derive(Debug, Clone, Default)]
pub struct SchemaPlan {
    /// Canonical event-type name → id (first record wins on duplicate names).
    pub event_type_ids: HashMap<String, u32>,
    pub types: HashMap<u32, TypePlan>,
    pub report: SchemaReport,
}

impl SchemaPlan {
    pub fn changed(&self) -> bool {
        self.report.types_modified > 0
    }

    pub fn event_type_id(&self, event_key: &str) -> Option<u32> {
        self.event_type_ids.get(event_key).copied()
    }

    pub fn type_plan(&self, event_type: u32) -> Option<&TypePlan> {
        self.types.get(&event_type)
    }
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub scope: ClassificationScope,
    pub languages: Languages,
}

/// Brings `event_types` in line with `usage`, rewriting grammars and capability
/// flags in place. Nothing is persisted here.
pub fn synchronize(
    event_types: &mut [EventTypeRow],
    usage: &RoleUsageMap,
    options: &SyncOptions,
) -> SchemaPlan {
    let mut plan = SchemaPlan {
        report: SchemaReport {
            event_types: event_types.len(),
            ..Default::default()
        },
        ..Default::default()
    };

    for row in event_types.iter_mut() {
        let key = canonical_key(&row.name);
        plan.event_type_ids.entry(key.clone()).or_insert(row.id);
        if plan.types.contains_key(&row.id) {
            tracing::warn!(id = row.id, name = %row.name, "duplicate event-type id ignored");
            continue;
        }

        let mut grammar = match RoleGrammar::parse(&row.grammar) {
            Ok(grammar) => grammar,
            Err(error) => {
                tracing::warn!(
                    id = row.id,
                    name = %row.name,
                    %error,
                    raw = %row.grammar,
                    "malformed role grammar left untouched, its witnesses use fallback codes"
                );
                plan.report.malformed_grammars += 1;
                plan.types.insert(row.id, TypePlan::default());
                continue;
            }
        };
        let mut labels = grammar.label_index();
        let mut type_plan = TypePlan::default();
        let mut created = 0;
        let mut needs_normal = false;
        let mut needs_principal = false;

        for (role_key, role, flags) in usage.roles_for_event(&key, options.scope) {
            let codes = type_plan.roles.entry(role_key.to_string()).or_default();
            let wanted = [
                (RoleVariant::Normal, flags.normal),
                (RoleVariant::Principal, flags.principal),
            ];
            for (variant, needed) in wanted {
                if !needed {
                    continue;
                }
                let primary = variant.label(&role.labels.primary);
                let code = match labels.get(&canonical_key(&primary)) {
                    Some(&code) => code,
                    None => {
                        let secondary = variant.label(&role.labels.secondary);
                        let pushed = grammar.push_entry(&[
                            (options.languages.primary.as_str(), primary.as_str()),
                            (options.languages.secondary.as_str(), secondary.as_str()),
                        ]);
                        let code = match pushed {
                            Ok(code) => code,
                            Err(error) => {
                                tracing::warn!(
                                    event_type = %row.name,
                                    role = %primary,
                                    %error,
                                    "role code not allocated"
                                );
                                continue;
                            }
                        };
                        for label in [&primary, &secondary] {
                            labels.entry(canonical_key(label)).or_insert(code);
                        }
                        tracing::info!(
                            event_type = %row.name,
                            role = %primary,
                            code,
                            %variant,
                            "role code allocated"
                        );
                        created += 1;
                        code
                    }
                };
                codes.set(variant, code);
            }
            needs_normal |= flags.normal;
            needs_principal |= flags.principal;
        }

        let mut modified = created > 0;
        if created > 0 {
            row.grammar = grammar.serialize();
        }
        if needs_normal && !row.witness_capable {
            row.witness_capable = true;
            modified = true;
        }
        if needs_principal && !row.principal_capable {
            row.principal_capable = true;
            modified = true;
        }
        if modified {
            plan.report.types_modified += 1;
            plan.report.codes_created += created;
        }

        type_plan.labels = labels;
        plan.types.insert(row.id, type_plan);
    }

    tracing::info!(
        event_types = plan.report.event_types,
        modified = plan.report.types_modified,
        codes = plan.report.codes_created,
        "schema synchronized"
    );
    plan
}
