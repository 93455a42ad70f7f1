//! # Engine: Witness Role Resolution & Injection
//!
//! **Role**: The state machine between the interchange scan and the target
//! database. One run walks six stages, each handing an immutable value to the next:
//!
//! | Stage | Module | Output |
//! |---|---|---|
//! | Mapping | `common::mapping` | [`common::Mapping`] |
//! | Scan | `gedcom::scan` | `Vec<EventBlock>` |
//! | Classify | [`classify`] | [`RoleUsageMap`] |
//! | Synchronize | [`sync`] | [`SchemaPlan`] (event-type rows updated) |
//! | Resolve | [`resolve`] | [`Indexes`] |
//! | Inject | [`inject`] | [`Tally`] |
//!
//! **Guarantees**:
//! - A second run over the same inputs injects nothing: every row is keyed on
//!   (event, person, role code, principal flag).
//! - Role codes grow strictly within an event type and are never reused.
//! - Sequence numbers continue from the event's current maximum.

pub mod classify;
pub mod config;
pub mod inject;
pub mod pipeline;
pub mod resolve;
pub mod sync;

pub use classify::{RoleUsage, RoleUsageMap, UsageFlags, UsageSummary};
pub use config::{ClassificationScope, Languages, RunConfig};
pub use inject::{FailureReason, InjectOptions, Outcome, Tally, WitnessSink};
pub use pipeline::{run, scan_roles, RunReport, ScanReport};
pub use resolve::{Candidate, Indexes};
pub use sync::{synchronize, RoleCodes, SchemaPlan, SchemaReport, SyncOptions, TypePlan};
