//! JSON-lines table files: streaming reads, atomic rewrites, appends.

use crate::StoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// The four tables of a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableKind {
    Person,
    Event,
    EventType,
    Witness,
}

impl TableKind {
    pub const ALL: [TableKind; 4] = [
        TableKind::Person,
        TableKind::Event,
        TableKind::EventType,
        TableKind::Witness,
    ];

    /// File name after the prefix.
    pub fn suffix(self) -> &'static str {
        match self {
            TableKind::Person => "person.jsonl",
            TableKind::Event => "event.jsonl",
            TableKind::EventType => "event_type.jsonl",
            TableKind::Witness => "witness.jsonl",
        }
    }

    pub fn file_name(self, prefix: &str) -> String {
        format!("{prefix}{}", self.suffix())
    }
}

/// Reads every row of a table. Blank lines are ignored.
///
/// # Errors
/// [`StoreError::Row`] names the file and the 1-based record that failed to parse.
pub fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let file = File::open(path)?;
    let stream = serde_json::Deserializer::from_reader(BufReader::new(file)).into_iter::<T>();

    let mut rows = Vec::new();
    for (index, row) in stream.enumerate() {
        let row = row.map_err(|source| StoreError::Row {
            path: path.to_path_buf(),
            record: index + 1,
            source,
        })?;
        rows.push(row);
    }
    tracing::debug!(path = %path.display(), rows = rows.len(), "table loaded");
    Ok(rows)
}

/// Rewrites a table through a sibling temporary file and a rename.
pub fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), StoreError> {
    let tmp = temp_path(path);
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        for row in rows {
            serde_json::to_writer(&mut writer, row)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
    }
    std::fs::rename(&tmp, path)?;
    tracing::debug!(path = %path.display(), rows = rows.len(), "table rewritten");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Opens a table for appending, terminating a last line that lacks its newline.
pub fn open_for_append(path: &Path) -> Result<BufWriter<File>, StoreError> {
    let mut file = OpenOptions::new().read(true).append(true).open(path)?;
    if file.metadata()?.len() > 0 {
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))?;
        file.read_exact(&mut last)?;
        if last[0] != b'\n' {
            file.write_all(b"\n")?;
        }
    }
    Ok(BufWriter::new(file))
}

/// Writes one row as a JSON line.
pub fn write_row<T: Serialize, W: Write>(writer: &mut W, row: &T) -> Result<(), StoreError> {
    serde_json::to_writer(&mut *writer, row)?;
    writer.write_all(b"\n")?;
    Ok(())
}
