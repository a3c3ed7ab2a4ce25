use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::commands::{CommandReport, enrich_with_geo, geo_lookup, open_ledger};
use crate::ledger::event::BatchLine;

#[derive(Debug, Clone)]
pub struct IngestBatchOptions {
    pub file: PathBuf,
}

/// Replay a JSONL file of events through one ledger so the session cache
/// is shared across lines.
pub fn run(opts: &IngestBatchOptions) -> Result<CommandReport> {
    let (cfg, ledger) = open_ledger()?;
    let lookup = geo_lookup(&cfg);
    let mut report = CommandReport::new("ingest-batch");

    let raw = fs::read_to_string(&opts.file)
        .with_context(|| format!("failed to read {}", opts.file.display()))?;

    let mut ingested = 0usize;
    let mut skipped = 0usize;
    let mut unpersisted = 0usize;
    for (idx, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let parsed = match serde_json::from_str::<BatchLine>(line) {
            Ok(parsed) => parsed,
            Err(err) => {
                skipped += 1;
                report.detail(format!("skipped line {}: {err}", idx + 1));
                continue;
            }
        };
        let event = enrich_with_geo(&cfg, lookup.as_ref(), parsed.into_event());
        let outcome = ledger.ingest(&event);
        ingested += 1;
        if !outcome.persisted {
            unpersisted += 1;
        }
        if let Some(warning) = outcome.warning {
            report.detail(format!("line {} key={} warning={warning}", idx + 1, outcome.key));
        }
    }

    report.detail(format!("file={}", opts.file.display()));
    report.detail(format!("ingested={ingested}"));
    report.detail(format!("skipped={skipped}"));
    report.detail(format!("unpersisted={unpersisted}"));
    report.detail(format!("session_keys={}", ledger.cache().len()));
    report.detail(format!("stored_records={}", ledger.records().len()));

    Ok(report)
}
