use crate::error::LedgerError;
use crate::ledger::record::{Record, RecordMap};
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Authoritative key -> record mapping persisted as one JSON document.
///
/// Every mutation rewrites the whole file; callers serialize writers
/// (see `Ledger`).
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Typed load for callers that need to tell "empty" from "broken".
    pub fn try_load(&self) -> Result<RecordMap, LedgerError> {
        if !self.path.exists() {
            return Ok(RecordMap::new());
        }
        let raw = fs::read(&self.path)?;
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(RecordMap::new());
        }
        serde_json::from_slice(&raw)
            .map_err(|err| LedgerError::StoreCorrupt(format!("{}: {err}", self.path.display())))
    }

    /// Missing, unreadable, or malformed artifacts all read as empty.
    pub fn load(&self) -> RecordMap {
        match self.try_load() {
            Ok(map) => map,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "treating record store as empty");
                RecordMap::new()
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<Record> {
        if key.trim().is_empty() {
            return None;
        }
        self.load().remove(key)
    }

    pub fn save(&self, records: &RecordMap) -> Result<()> {
        let data = serde_json::to_string_pretty(records)?;
        write_atomic(&self.path, format!("{data}\n").as_bytes())
    }

    /// Replace the entry at `key` in the mapping the caller loaded (under
    /// the write lock) and save it. Never reloads, so a store that failed to
    /// load is not silently replaced.
    pub fn upsert(&self, mut records: RecordMap, key: &str, record: Record) -> Result<RecordMap> {
        if key.trim().is_empty() {
            anyhow::bail!("record key cannot be empty");
        }
        records.insert(key.to_string(), record);
        self.save(&records)?;
        Ok(records)
    }

    /// Move a corrupt store aside so the next save does not destroy it.
    pub fn quarantine(&self, stamp: &str) -> Result<PathBuf> {
        let file_name = self
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("captured_records.json");
        let target = self.path.with_file_name(format!("{file_name}.corrupt-{stamp}"));
        fs::rename(&self.path, &target).with_context(|| {
            format!(
                "failed to move {} to {}",
                self.path.display(),
                target.display()
            )
        })?;
        Ok(target)
    }
}

/// Write through a sibling temp file and rename it over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
    tmp.write_all(bytes)
        .with_context(|| format!("failed to write temp file for {}", path.display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("failed to sync temp file for {}", path.display()))?;
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
