//! # Store: The Target Genealogical Database
//!
//! **Role**: Reads and mutates the four tables the engine works against. Each
//! table is a JSON-lines file named `<prefix><table>.jsonl` inside one directory.
//!
//! **Core Types**:
//! - [`TargetDb`]: an opened database directory, exclusively locked when writable.
//! - [`PersonRow`], [`EventRow`], [`EventTypeRow`], [`WitnessRow`]: one row each.
//! - [`WitnessAppender`]: buffered append handle for new witness rows.
//!
//! **Guarantees**:
//! - Columns this workspace does not know are kept and written back unchanged.
//! - Witness rows are only ever appended; event-type rows are rewritten through a
//!   temporary file and an atomic rename.

pub mod db;
pub mod prefix;
pub mod rows;
pub mod table;

pub use db::{OpenMode, TargetDb, WitnessAppender};
pub use prefix::detect_prefix;
pub use rows::{dataset_id, EventRow, EventTypeRow, PersonRow, StoredValue, WitnessRow};
pub use table::TableKind;

use std::path::PathBuf;

/// Errors from database access.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("required table missing: {}", .0.display())]
    MissingTable(PathBuf),

    #[error("no database tables found in {}", .0.display())]
    NoTables(PathBuf),

    #[error("several table prefixes in {}: {}", .dir.display(), .prefixes.join(", "))]
    AmbiguousPrefix { dir: PathBuf, prefixes: Vec<String> },

    /// Another run holds the lock file.
    #[error("database is locked by another run (remove {} if stale)", .0.display())]
    Locked(PathBuf),

    #[error("database was opened read-only")]
    ReadOnly,

    #[error("{}: record {record}: {source}", .path.display())]
    Row {
        path: PathBuf,
        record: usize,
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
