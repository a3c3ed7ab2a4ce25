use crate::error::{LedgerError, LedgerErrorCode};
use crate::ledger::audit;
use crate::ledger::cache::SessionCache;
use crate::ledger::config::LedgerConfig;
use crate::ledger::event::InboundEvent;
use crate::ledger::merge::{merge_records, only_timestamp_changed};
use crate::ledger::paths::LedgerPaths;
use crate::ledger::record::{Record, RecordMap};
use crate::ledger::report::{self, ReportBlock, ReportStyle};
use crate::ledger::store::RecordStore;
use crate::ledger::warn;
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use fs2::FileExt;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// What a single ingest did. Persistence failures show up here and in the
/// logs, never as an error.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub key: String,
    pub record: Record,
    pub persisted: bool,
    pub report_regenerated: bool,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsistencyReport {
    pub records: usize,
    pub blocks: usize,
    pub duplicate_keys: Vec<String>,
    pub missing_keys: Vec<String>,
    pub stale_keys: Vec<String>,
    pub mismatched_keys: Vec<String>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.records == self.blocks
            && self.duplicate_keys.is_empty()
            && self.missing_keys.is_empty()
            && self.stale_keys.is_empty()
            && self.mismatched_keys.is_empty()
    }
}

/// Exclusive advisory lock on `<home>/ledger.lock`, released on drop.
struct LockFile {
    file: File,
}

impl LockFile {
    fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("failed to lock {}", path.display()))?;
        Ok(Self { file })
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Merge-and-persist engine: one store, one report, one session cache.
///
/// Every write holds `write_lock` (threads) and the lock file (processes)
/// for the whole load -> merge -> save -> render cycle.
pub struct Ledger {
    paths: LedgerPaths,
    store: RecordStore,
    style: ReportStyle,
    cache: Arc<SessionCache>,
    skip_timestamp_only_writes: bool,
    write_lock: Mutex<()>,
}

pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl Ledger {
    pub fn open(paths: LedgerPaths, cfg: &LedgerConfig) -> Result<Self> {
        Self::with_cache(paths, cfg, Arc::new(SessionCache::new()))
    }

    pub fn with_cache(
        paths: LedgerPaths,
        cfg: &LedgerConfig,
        cache: Arc<SessionCache>,
    ) -> Result<Self> {
        Ok(Self {
            store: RecordStore::new(&paths.store_file),
            style: cfg.report_style()?,
            cache,
            skip_timestamp_only_writes: cfg.store.skip_timestamp_only_writes,
            write_lock: Mutex::new(()),
            paths,
        })
    }

    pub fn paths(&self) -> &LedgerPaths {
        &self.paths
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    /// Whether the key has been seen, answered from the cache when possible.
    pub fn knows(&self, key: &str) -> bool {
        self.cache.contains(key) || self.store.get(key).is_some()
    }

    pub fn lookup(&self, key: &str) -> Option<Record> {
        self.cache.get(key).or_else(|| self.store.get(key))
    }

    pub fn records(&self) -> RecordMap {
        self.store.load()
    }

    fn serialize(&self) -> (MutexGuard<'_, ()>, Option<LockFile>) {
        let guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let file_lock = match LockFile::acquire(&self.paths.lock_file()) {
            Ok(lock) => Some(lock),
            Err(err) => {
                warn::emit(
                    LedgerErrorCode::E004LockUnavailable,
                    "lock",
                    "-",
                    "continuing with in-process lock only",
                    &format!("{err:#}"),
                );
                None
            }
        };
        (guard, file_lock)
    }

    /// Load the mapping a write will replace. A store that does not decode is
    /// moved aside first; one that cannot be read at all blocks the write so
    /// it is never overwritten. `Err` carries the warning for the outcome.
    fn load_for_write(&self, key: &str) -> Result<RecordMap, String> {
        match self.store.try_load() {
            Ok(map) => Ok(map),
            Err(LedgerError::StoreCorrupt(detail)) => {
                warn::emit(
                    LedgerErrorCode::E001StoreCorrupt,
                    "load",
                    key,
                    "store unparseable, starting empty",
                    &detail,
                );
                let stamp = Utc::now().format("%Y%m%dT%H%M%S%.6f").to_string();
                match self.store.quarantine(&stamp) {
                    Ok(moved) => {
                        tracing::warn!(path = %moved.display(), "moved corrupt record store aside");
                        Ok(RecordMap::new())
                    }
                    Err(err) => Err(self.report_failure(
                        LedgerErrorCode::E001StoreCorrupt,
                        "quarantine",
                        key,
                        &err,
                    )),
                }
            }
            Err(err) => Err(self.report_failure(
                LedgerErrorCode::E006StoreUnreadable,
                "load",
                key,
                &anyhow::Error::new(err),
            )),
        }
    }

    fn report_failure(
        &self,
        code: LedgerErrorCode,
        stage: &str,
        key: &str,
        err: &anyhow::Error,
    ) -> String {
        let detail = format!("{err:#}");
        warn::emit(code, stage, key, "write failed", &detail);
        if let Err(audit_err) = audit::append_event(&self.paths, stage, "failed", key, &detail) {
            tracing::debug!(error = %format!("{audit_err:#}"), "audit append failed");
        }
        format!("{stage} failed: {detail}")
    }

    /// Resolve, merge, persist, and re-render for one inbound event.
    pub fn ingest(&self, event: &InboundEvent) -> IngestOutcome {
        let key = event.resolve_key();
        let mut update = event.to_update();
        if update.is_empty() {
            tracing::debug!(key = %key, kind = event.kind.as_str(), "event carried no fields");
        }
        if update
            .timestamp
            .as_deref()
            .is_none_or(|ts| ts.trim().is_empty())
        {
            update.timestamp = Some(now_timestamp());
        }

        let _locks = self.serialize();
        let (records, blocked) = match self.load_for_write(&key) {
            Ok(records) => (records, None),
            Err(warning) => (RecordMap::new(), Some(warning)),
        };
        let stored = records.get(&key).cloned();
        let base = pick_base(stored.as_ref(), self.cache.get(&key));
        let merged = merge_records(base.as_ref(), &key, &update);
        self.cache.insert(merged.clone());

        let mut outcome = IngestOutcome {
            key: key.clone(),
            record: merged.clone(),
            persisted: true,
            report_regenerated: false,
            warning: None,
        };
        if let Some(warning) = blocked {
            outcome.persisted = false;
            outcome.warning = Some(warning);
            return outcome;
        }

        let unchanged = stored.as_ref().is_some_and(|s| {
            *s == merged || (self.skip_timestamp_only_writes && only_timestamp_changed(s, &merged))
        });
        if unchanged {
            tracing::debug!(
                key = %key,
                kind = event.kind.as_str(),
                "merge produced no persisted change"
            );
            match report::sync_report(&self.paths.report_file, &records, &self.style) {
                Ok(rewritten) => outcome.report_regenerated = rewritten,
                Err(err) => {
                    outcome.warning = Some(self.report_failure(
                        LedgerErrorCode::E003ReportWriteFailed,
                        "report",
                        &key,
                        &err,
                    ));
                }
            }
            return outcome;
        }

        let records = match self.store.upsert(records, &key, merged) {
            Ok(records) => records,
            Err(err) => {
                outcome.persisted = false;
                outcome.warning = Some(self.report_failure(
                    LedgerErrorCode::E002StoreWriteFailed,
                    "persist",
                    &key,
                    &err,
                ));
                return outcome;
            }
        };
        self.render_into(&records, &key, &mut outcome);

        tracing::info!(
            key = %key,
            kind = event.kind.as_str(),
            records = records.len(),
            report = outcome.report_regenerated,
            "record merged"
        );
        outcome
    }

    fn render_into(&self, records: &RecordMap, key: &str, outcome: &mut IngestOutcome) {
        match report::write_report(&self.paths.report_file, records, &self.style) {
            Ok(()) => outcome.report_regenerated = true,
            Err(err) => {
                outcome.warning = Some(self.report_failure(
                    LedgerErrorCode::E003ReportWriteFailed,
                    "report",
                    key,
                    &err,
                ));
            }
        }
    }

    /// Rebuild the report from the store; returns the number of blocks.
    pub fn regenerate_report(&self) -> Result<usize> {
        let _locks = self.serialize();
        let records = self.store.load();
        report::write_report(&self.paths.report_file, &records, &self.style)?;
        Ok(records.len())
    }

    /// Compare the rendered report with what the store says it should be.
    pub fn check_consistency(&self) -> Result<ConsistencyReport> {
        let _locks = self.serialize();
        let records = self.store.try_load()?;
        let text = if self.paths.report_file.exists() {
            fs::read_to_string(&self.paths.report_file).with_context(|| {
                format!("failed to read {}", self.paths.report_file.display())
            })?
        } else {
            String::new()
        };
        Ok(compare(&records, &report::parse_blocks(&text)))
    }
}

fn parse_ts(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.with_timezone(&Utc))
}

/// The store is authoritative unless this process holds a strictly newer
/// copy, which happens after a failed write.
fn pick_base(stored: Option<&Record>, cached: Option<Record>) -> Option<Record> {
    match (stored, cached) {
        (None, cached) => cached,
        (Some(stored), None) => Some(stored.clone()),
        (Some(stored), Some(cached)) => {
            let newer = match (
                parse_ts(cached.timestamp.as_deref()),
                parse_ts(stored.timestamp.as_deref()),
            ) {
                (Some(c), Some(s)) => c > s,
                (Some(_), None) => true,
                _ => false,
            };
            if newer { Some(cached) } else { Some(stored.clone()) }
        }
    }
}

fn compare(records: &RecordMap, blocks: &[ReportBlock]) -> ConsistencyReport {
    let mut seen: BTreeMap<&str, &ReportBlock> = BTreeMap::new();
    let mut duplicates = BTreeSet::new();
    for block in blocks {
        if seen.insert(block.key.as_str(), block).is_some() {
            duplicates.insert(block.key.clone());
        }
    }

    let mut out = ConsistencyReport {
        records: records.len(),
        blocks: blocks.len(),
        duplicate_keys: duplicates.into_iter().collect(),
        ..ConsistencyReport::default()
    };
    for (key, record) in records {
        let expected = ReportBlock::expected_for(record);
        match seen.get(expected.key.as_str()) {
            None => out.missing_keys.push(key.clone()),
            Some(block) if **block != expected => out.mismatched_keys.push(key.clone()),
            Some(_) => {}
        }
    }
    let expected_keys: BTreeSet<String> = records
        .values()
        .map(|r| ReportBlock::expected_for(r).key)
        .collect();
    for key in seen.keys() {
        if !expected_keys.contains(*key) {
            out.stale_keys.push((*key).to_string());
        }
    }
    out
}
