//! # Gedcom: Interchange File Scanner
//!
//! **Role**: Turns a leveled tag/value interchange export into the facts the
//! engine consumes. Nothing here touches the target database.
//!
//! **Core Types**:
//! - [`Line`]: one tokenized `level [@xref@] TAG [value]` line.
//! - [`EventBlock`]: an event of an individual or family record together with the
//!   witness references (`_SHAR`) declared inside it.
//! - [`ReferenceCodes`]: interchange individual id → cross-reference code (`REFN`).
//!
//! **Design**:
//! - The file is mapped once with `memmap2` and decoded into a single `String`;
//!   every pass borrows that text, so "scanning twice" costs no second read.
//! - Input is UTF-8 (optional BOM); anything that is not valid UTF-8 is decoded
//!   as Windows-1252, the "ANSI" export of desktop genealogy tools.

pub mod date;
pub mod decode;
pub mod line;
pub mod scan;
pub mod xref;

pub use date::{interchange_year, stored_year};
pub use line::Line;
pub use scan::{scan, EventBlock, Owner, OwnerKind, ScanOptions, WitnessRef};
pub use xref::{reference_codes, ReferenceCodes};

use memmap2::MmapOptions;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Interchange errors. Any of them aborts the run before mutation.
#[derive(Debug, thiserror::Error)]
pub enum GedcomError {
    /// The interchange file does not exist.
    #[error("interchange file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// I/O error (open, mmap).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Reads and decodes the interchange file at `path`.
///
/// # Errors
/// - [`GedcomError::NotFound`] if `path` does not exist.
/// - [`GedcomError::IoError`] on open or mmap failure.
pub fn read_interchange(path: &Path) -> Result<String, GedcomError> {
    if !path.exists() {
        return Err(GedcomError::NotFound(path.to_path_buf()));
    }
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(String::new());
    }
    // SAFETY: the mapping is read-only and dropped before `file`.
    let mmap = unsafe { MmapOptions::new().map(&file)? };
    let text = decode::decode(&mmap);
    tracing::debug!(path = %path.display(), bytes = mmap.len(), "interchange file decoded");
    Ok(text)
}
