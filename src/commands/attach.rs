use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::commands::{CommandReport, open_ledger};
use crate::ledger::blobs::{BlobSink, FsBlobSink};

#[derive(Debug, Clone)]
pub struct AttachOptions {
    pub key: String,
    pub kind: String,
    pub file: PathBuf,
}

pub fn run(opts: &AttachOptions) -> Result<CommandReport> {
    let (cfg, ledger) = open_ledger()?;
    let mut report = CommandReport::new("attach");

    if opts.key.trim().is_empty() {
        report.issue("attachment key cannot be empty");
        return Ok(report);
    }

    let bytes = fs::read(&opts.file)
        .with_context(|| format!("failed to read {}", opts.file.display()))?;
    let ext = opts
        .file
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("bin");

    let sink = FsBlobSink::new(&ledger.paths().blobs_dir, cfg.blobs.max_bytes);
    match sink.store(&opts.key, &opts.kind, &bytes, ext) {
        Ok(path) => {
            report.detail(format!("stored={}", path.display()));
            report.detail(format!("bytes={}", bytes.len()));
            report.detail(format!("known_key={}", ledger.knows(&opts.key)));
        }
        Err(err) => report.issue(format!("attach failed: {err:#}")),
    }

    Ok(report)
}
