//! Table prefix detection.
//!
//! A database directory normally holds one project, so every table shares one
//! file-name prefix (`demo_person.jsonl`, `demo_event.jsonl`, …). Only prefixes for
//! which all four tables exist are considered.

use crate::table::TableKind;
use crate::StoreError;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use walkdir::WalkDir;

/// Finds the table prefix used in `dir`.
///
/// With several complete prefixes, `hint` (case-insensitive substring) picks the
/// shortest matching one.
///
/// # Errors
/// - [`StoreError::DirectoryNotFound`] if `dir` is not a directory.
/// - [`StoreError::NoTables`] if no prefix has all four tables.
/// - [`StoreError::AmbiguousPrefix`] if several prefixes remain.
pub fn detect_prefix(dir: &Path, hint: Option<&str>) -> Result<String, StoreError> {
    if !dir.is_dir() {
        return Err(StoreError::DirectoryNotFound(dir.to_path_buf()));
    }

    let mut seen: BTreeMap<String, BTreeSet<TableKind>> = BTreeMap::new();
    for entry in WalkDir::new(dir).max_depth(1).into_iter().flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        let kind = TableKind::ALL
            .into_iter()
            .find(|k| name.ends_with(k.suffix()));
        if let Some(kind) = kind {
            let prefix = &name[..name.len() - kind.suffix().len()];
            seen.entry(prefix.to_string()).or_default().insert(kind);
        }
    }

    let mut complete: Vec<String> = seen
        .into_iter()
        .filter(|(_, kinds)| kinds.len() == TableKind::ALL.len())
        .map(|(prefix, _)| prefix)
        .collect();

    if let (Some(hint), true) = (hint.map(str::to_lowercase), complete.len() > 1) {
        let shortest = complete
            .iter()
            .filter(|p| p.to_lowercase().contains(&hint))
            .min_by_key(|p| p.len())
            .cloned();
        if let Some(prefix) = shortest {
            tracing::info!(%prefix, "table prefix chosen by hint");
            return Ok(prefix);
        }
    }

    match complete.len() {
        0 => Err(StoreError::NoTables(dir.to_path_buf())),
        1 => Ok(complete.remove(0)),
        _ => Err(StoreError::AmbiguousPrefix {
            dir: dir.to_path_buf(),
            prefixes: complete,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch_tables(dir: &Path, prefix: &str) {
        for kind in TableKind::ALL {
            std::fs::write(dir.join(kind.file_name(prefix)), "").unwrap();
        }
    }

    #[test]
    fn test_single_prefix() {
        let dir = tempfile::tempdir().unwrap();
        touch_tables(dir.path(), "demo_");
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        assert_eq!(detect_prefix(dir.path(), None).unwrap(), "demo_");
    }

    #[test]
    fn test_empty_prefix() {
        let dir = tempfile::tempdir().unwrap();
        touch_tables(dir.path(), "");
        assert_eq!(detect_prefix(dir.path(), None).unwrap(), "");
    }

    #[test]
    fn test_incomplete_prefix_ignored() {
        let dir = tempfile::tempdir().unwrap();
        touch_tables(dir.path(), "demo_");
        std::fs::write(dir.path().join("old_person.jsonl"), "").unwrap();
        assert_eq!(detect_prefix(dir.path(), None).unwrap(), "demo_");
    }

    #[test]
    fn test_ambiguous_prefixes() {
        let dir = tempfile::tempdir().unwrap();
        touch_tables(dir.path(), "a_");
        touch_tables(dir.path(), "b_");
        let err = detect_prefix(dir.path(), None).unwrap_err();
        assert!(matches!(err, StoreError::AmbiguousPrefix { ref prefixes, .. } if prefixes.len() == 2));
    }

    #[test]
    fn test_hint_picks_shortest_match() {
        let dir = tempfile::tempdir().unwrap();
        touch_tables(dir.path(), "family_");
        touch_tables(dir.path(), "family_copy_");
        touch_tables(dir.path(), "other_");
        assert_eq!(detect_prefix(dir.path(), Some("FAMILY")).unwrap(), "family_");
    }

    #[test]
    fn test_no_tables() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            detect_prefix(dir.path(), None),
            Err(StoreError::NoTables(_))
        ));
    }
}
