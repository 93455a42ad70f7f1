//! Opened database directory and its lock.

use crate::rows::{EventRow, EventTypeRow, PersonRow, WitnessRow};
use crate::table::{self, TableKind};
use crate::StoreError;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// How a database is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// No lock, no writes. Used for simulation runs.
    ReadOnly,
    /// Exclusive lock for the lifetime of the handle.
    ReadWrite,
}

/// Lock file removed on drop.
#[derive(Debug)]
struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    fn acquire(path: PathBuf) -> Result<Self, StoreError> {
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())?;
                tracing::debug!(lock = %path.display(), "database lock acquired");
                Ok(Self { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(StoreError::Locked(path)),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(lock = %self.path.display(), error = %e, "could not remove lock file");
        }
    }
}

/// A database directory with a fixed table prefix.
#[derive(Debug)]
pub struct TargetDb {
    dir: PathBuf,
    prefix: String,
    lock: Option<LockGuard>,
}

impl TargetDb {
    /// Opens the database in `dir` whose tables are named `<prefix><table>.jsonl`.
    ///
    /// # Errors
    /// - [`StoreError::DirectoryNotFound`] / [`StoreError::MissingTable`] if any of the
    ///   four tables is absent.
    /// - [`StoreError::Locked`] in [`OpenMode::ReadWrite`] when another run holds the lock.
    pub fn open(dir: &Path, prefix: &str, mode: OpenMode) -> Result<Self, StoreError> {
        if !dir.is_dir() {
            return Err(StoreError::DirectoryNotFound(dir.to_path_buf()));
        }
        let dir = dunce::canonicalize(dir)?;
        for kind in TableKind::ALL {
            let path = dir.join(kind.file_name(prefix));
            if !path.is_file() {
                return Err(StoreError::MissingTable(path));
            }
        }

        let lock = match mode {
            OpenMode::ReadOnly => None,
            OpenMode::ReadWrite => Some(LockGuard::acquire(dir.join(format!("{prefix}.lock")))?),
        };

        tracing::info!(dir = %dir.display(), prefix, ?mode, "database opened");
        Ok(Self {
            dir,
            prefix: prefix.to_string(),
            lock,
        })
    }

    pub fn is_writable(&self) -> bool {
        self.lock.is_some()
    }

    pub fn table_path(&self, kind: TableKind) -> PathBuf {
        self.dir.join(kind.file_name(&self.prefix))
    }

    pub fn persons(&self) -> Result<Vec<PersonRow>, StoreError> {
        table::read_rows(&self.table_path(TableKind::Person))
    }

    pub fn events(&self) -> Result<Vec<EventRow>, StoreError> {
        table::read_rows(&self.table_path(TableKind::Event))
    }

    pub fn event_types(&self) -> Result<Vec<EventTypeRow>, StoreError> {
        table::read_rows(&self.table_path(TableKind::EventType))
    }

    pub fn witnesses(&self) -> Result<Vec<WitnessRow>, StoreError> {
        table::read_rows(&self.table_path(TableKind::Witness))
    }

    /// Rewrites the event-type table with `rows`.
    ///
    /// # Errors
    /// [`StoreError::ReadOnly`] unless opened with [`OpenMode::ReadWrite`].
    pub fn save_event_types(&self, rows: &[EventTypeRow]) -> Result<(), StoreError> {
        self.ensure_writable()?;
        table::write_rows(&self.table_path(TableKind::EventType), rows)
    }

    /// Opens the witness table for appending.
    ///
    /// # Errors
    /// [`StoreError::ReadOnly`] unless opened with [`OpenMode::ReadWrite`].
    pub fn witness_appender(&self) -> Result<WitnessAppender, StoreError> {
        self.ensure_writable()?;
        let writer = table::open_for_append(&self.table_path(TableKind::Witness))?;
        Ok(WitnessAppender {
            writer,
            appended: 0,
        })
    }

    fn ensure_writable(&self) -> Result<(), StoreError> {
        if self.is_writable() {
            Ok(())
        } else {
            Err(StoreError::ReadOnly)
        }
    }
}

/// Buffered appender for the witness table. Call [`WitnessAppender::finish`] to flush.
#[derive(Debug)]
pub struct WitnessAppender {
    writer: BufWriter<File>,
    appended: usize,
}

impl WitnessAppender {
    pub fn append(&mut self, row: &WitnessRow) -> Result<(), StoreError> {
        table::write_row(&mut self.writer, row)?;
        self.appended += 1;
        Ok(())
    }

    /// Flushes buffered rows and returns how many were appended.
    pub fn finish(mut self) -> Result<usize, StoreError> {
        self.writer.flush()?;
        Ok(self.appended)
    }
}
