//! Staged run: Loader → Scanner → Classifier → Synchronizer → Resolver → Injector.
//!
//! Fatal checks (mapping, tables, lock) happen before anything is read from the
//! interchange file. Every table is loaded before the first write, so a corrupt
//! row aborts the run with the database untouched.

use crate::classify::{RoleUsageMap, UsageSummary};
use crate::config::RunConfig;
use crate::inject::{inject, InjectOptions, Tally};
use crate::resolve::Indexes;
use crate::sync::{synchronize, SchemaReport, SyncOptions};
use anyhow::Context;
use common::Mapping;
use gedcom::{read_interchange, reference_codes, scan, EventBlock, ScanOptions};
use std::path::Path;
use store::{detect_prefix, OpenMode, TargetDb, WitnessRow};

/// Results of a full run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub prefix: String,
    pub dataset: u32,
    pub simulated: bool,
    /// Event blocks carrying at least one witness reference.
    pub events: usize,
    pub references: usize,
    pub usage: UsageSummary,
    pub schema: SchemaReport,
    pub tally: Tally,
}

/// Results of a read-only scan.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub events: usize,
    pub references: usize,
    pub usage: RoleUsageMap,
}

fn count_references(blocks: &[EventBlock]) -> usize {
    blocks.iter().map(|b| b.witnesses.len()).sum()
}

/// Runs Loader → Scanner → Classifier without touching any database.
///
/// # Errors
/// Fails when the mapping or the interchange file cannot be read.
pub fn scan_roles(
    interchange: &Path,
    mapping: &Path,
    options: &ScanOptions,
) -> anyhow::Result<ScanReport> {
    let mapping = Mapping::load(mapping)
        .with_context(|| format!("Failed to load mapping {}", mapping.display()))?;
    let text = read_interchange(interchange)
        .with_context(|| format!("Failed to read interchange file {}", interchange.display()))?;
    let blocks = scan(&text, &mapping.events, options);
    let usage = RoleUsageMap::classify(&blocks, &mapping.roles);
    Ok(ScanReport {
        events: blocks.len(),
        references: count_references(&blocks),
        usage,
    })
}

/// Runs the full pipeline against the configured database.
///
/// In simulation mode the database is opened read-only and every decision is
/// computed (codes, sequences, dedup) without writing.
///
/// # Errors
/// - Mapping missing or malformed, table prefix not found, tables missing, lock held.
/// - Interchange unreadable, a table row unparsable, or an I/O failure while writing.
pub fn run(config: &RunConfig) -> anyhow::Result<RunReport> {
    // [1/6] Mapping
    let mapping = Mapping::load(&config.mapping)
        .with_context(|| format!("Failed to load mapping {}", config.mapping.display()))?;
    tracing::info!(
        events = mapping.events.len(),
        roles = mapping.roles.len(),
        "mapping loaded"
    );

    // Database: prefix, tables, lock.
    let prefix = match &config.prefix {
        Some(prefix) => prefix.clone(),
        None => detect_prefix(&config.database, config.prefix_hint.as_deref()).with_context(
            || format!("Failed to detect table prefix in {}", config.database.display()),
        )?,
    };
    let mode = if config.simulate {
        OpenMode::ReadOnly
    } else {
        OpenMode::ReadWrite
    };
    let db = TargetDb::open(&config.database, &prefix, mode)
        .with_context(|| format!("Failed to open database {}", config.database.display()))?;

    // [2/6] Scan
    let text = read_interchange(&config.interchange).with_context(|| {
        format!(
            "Failed to read interchange file {}",
            config.interchange.display()
        )
    })?;
    let blocks = scan(&text, &mapping.events, &config.scan_options());

    // [3/6] Classify
    let usage = RoleUsageMap::classify(&blocks, &mapping.roles);
    let summary = usage.summary();
    tracing::info!(
        roles = summary.roles,
        normal = summary.normal,
        principal = summary.principal,
        both = summary.both,
        "role usage classified"
    );

    // All tables are read before the first write.
    let mut event_types = db.event_types().context("Failed to read event-type table")?;
    let persons = db.persons().context("Failed to read person table")?;
    let events = db.events().context("Failed to read event table")?;
    let witnesses = db.witnesses().context("Failed to read witness table")?;

    // [4/6] Synchronize
    let plan = synchronize(
        &mut event_types,
        &usage,
        &SyncOptions {
            scope: config.scope,
            languages: config.languages.clone(),
        },
    );
    if plan.changed() && !config.simulate {
        db.save_event_types(&event_types)
            .context("Failed to write event-type table")?;
    }

    // [5/6] Resolve
    let codes = reference_codes(&text);
    let mut indexes = Indexes::build(&persons, &events, &witnesses, &codes);

    // [6/6] Inject
    let options = InjectOptions {
        default_role_code: config.default_role_code,
        note_capacity: config.note_capacity,
        witness_role: config.witness_role.clone(),
    };
    let tally = if config.simulate {
        tracing::warn!("simulation mode: no data will be written");
        let mut discarded: Vec<WitnessRow> = Vec::new();
        inject(&blocks, &plan, &mapping.roles, &mut indexes, &options, &mut discarded)?
    } else {
        let mut appender = db
            .witness_appender()
            .context("Failed to open witness table for appending")?;
        let tally = inject(&blocks, &plan, &mapping.roles, &mut indexes, &options, &mut appender)
            .context("Failed to append witness rows")?;
        appender.finish().context("Failed to flush witness table")?;
        tally
    };

    Ok(RunReport {
        prefix,
        dataset: indexes.dataset,
        simulated: config.simulate,
        events: blocks.len(),
        references: count_references(&blocks),
        usage: summary,
        schema: plan.report,
        tally,
    })
}
