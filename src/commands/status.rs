use anyhow::Result;

use crate::commands::{CommandReport, open_ledger};
use crate::ledger::config::unknown_env_vars;

pub fn run() -> Result<CommandReport> {
    let (cfg, ledger) = open_ledger()?;
    let paths = ledger.paths();
    let mut report = CommandReport::new("status");

    report.detail(format!("ledger_home={}", paths.ledger_home.display()));
    report.detail(format!("store_file={}", paths.store_file.display()));
    report.detail(format!("report_file={}", paths.report_file.display()));
    report.detail(format!("blobs_dir={}", paths.blobs_dir.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));
    report.detail(format!("report_timezone={}", cfg.report.timezone));
    report.detail(format!(
        "skip_timestamp_only_writes={}",
        cfg.store.skip_timestamp_only_writes
    ));
    report.detail(format!("geo_enabled={}", cfg.geo.enabled));
    for var in unknown_env_vars() {
        report.detail(format!("unrecognized env var {var} (ignored)"));
    }

    if !paths.store_file.exists() {
        report.detail("store_file=absent (no records captured yet)");
        return Ok(report);
    }
    report.detail(format!("records={}", ledger.records().len()));
    if !paths.report_file.exists() {
        report.issue("missing report file; run `client-ledger repair`");
    }

    Ok(report)
}
