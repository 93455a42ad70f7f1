//! Role usage classification.
//!
//! A reference is "principal" when the witness is the owning record itself
//! (`witness id == owner id`, or a spouse of an owning family), "normal" otherwise. Flags are collected both per
//! role and per (role, event type) so either scope can be served later.

use crate::config::ClassificationScope;
use common::{canonical_key, RoleLabels, RoleMapping};
use gedcom::EventBlock;
use std::collections::BTreeMap;

/// Which variants of a role are needed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageFlags {
    pub normal: bool,
    pub principal: bool,
}

impl UsageFlags {
    fn mark(&mut self, is_self: bool) {
        if is_self {
            self.principal = true;
        } else {
            self.normal = true;
        }
    }

    pub fn any(self) -> bool {
        self.normal || self.principal
    }
}

/// Aggregated usage of one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleUsage {
    pub labels: RoleLabels,
    /// Flags over the whole scan.
    pub flags: UsageFlags,
    /// Flags per event-type key.
    pub events: BTreeMap<String, UsageFlags>,
}

impl RoleUsage {
    /// Flags to honour for `event_key` under `scope`. Empty when the role never
    /// appears in that event type.
    pub fn flags_for(&self, event_key: &str, scope: ClassificationScope) -> UsageFlags {
        match (self.events.get(event_key), scope) {
            (None, _) => UsageFlags::default(),
            (Some(_), ClassificationScope::Global) => self.flags,
            (Some(local), ClassificationScope::PerEventType) => *local,
        }
    }
}

/// Counts for the usage report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageSummary {
    pub roles: usize,
    pub normal: usize,
    pub principal: usize,
    pub both: usize,
}

/// Normalized role key → usage, ordered by key.
#[derive(Debug, Clone, Default)]
pub struct RoleUsageMap {
    roles: BTreeMap<String, RoleUsage>,
}

impl RoleUsageMap {
    /// Aggregates every witness reference of `blocks`.
    pub fn classify(blocks: &[EventBlock], roles: &RoleMapping) -> Self {
        let mut map: BTreeMap<String, RoleUsage> = BTreeMap::new();
        for block in blocks {
            for witness in &block.witnesses {
                let key = canonical_key(&witness.role);
                if key.is_empty() {
                    tracing::warn!(role = %witness.role, "role has no usable key, not classified");
                    continue;
                }
                let is_self = block.is_self(witness);
                let usage = map.entry(key).or_insert_with(|| RoleUsage {
                    labels: roles.labels_for(&witness.role),
                    flags: UsageFlags::default(),
                    events: BTreeMap::new(),
                });
                usage.flags.mark(is_self);
                usage
                    .events
                    .entry(block.event_key.clone())
                    .or_default()
                    .mark(is_self);
            }
        }
        Self { roles: map }
    }

    pub fn get(&self, key: &str) -> Option<&RoleUsage> {
        self.roles.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RoleUsage)> {
        self.roles.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Roles appearing in `event_key` with the flags to honour there, in key order.
    pub fn roles_for_event<'a>(
        &'a self,
        event_key: &'a str,
        scope: ClassificationScope,
    ) -> impl Iterator<Item = (&'a str, &'a RoleUsage, UsageFlags)> + 'a {
        self.roles.iter().filter_map(move |(key, usage)| {
            let flags = usage.flags_for(event_key, scope);
            flags.any().then_some((key.as_str(), usage, flags))
        })
    }

    pub fn summary(&self) -> UsageSummary {
        let mut summary = UsageSummary {
            roles: self.roles.len(),
            ..Default::default()
        };
        for usage in self.roles.values() {
            summary.normal += usize::from(usage.flags.normal);
            summary.principal += usize::from(usage.flags.principal);
            summary.both += usize::from(usage.flags.normal && usage.flags.principal);
        }
        summary
    }
}
