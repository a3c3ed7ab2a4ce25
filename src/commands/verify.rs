use anyhow::Result;

use crate::commands::{CommandReport, open_ledger, status};
use crate::error::LedgerErrorCode;
use crate::ledger::config::unknown_env_vars;

/// `strict` also folds in `status` and treats unrecognized `LEDGER_*`
/// variables as failures instead of notes.
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    pub strict: bool,
}

pub fn run(opts: &VerifyOptions) -> Result<CommandReport> {
    let (_, ledger) = open_ledger()?;
    let mut report = CommandReport::new("verify");

    match ledger.check_consistency() {
        Ok(check) => {
            report.detail(format!("records={}", check.records));
            report.detail(format!("blocks={}", check.blocks));
            for key in &check.duplicate_keys {
                report.issue(format!("duplicate report block for key {key}"));
            }
            for key in &check.missing_keys {
                report.issue(format!("report missing block for key {key}"));
            }
            for key in &check.stale_keys {
                report.issue(format!("report block for unknown key {key}"));
            }
            for key in &check.mismatched_keys {
                report.issue(format!("report block out of date for key {key}"));
            }
            if check.is_consistent() {
                report.detail("report matches store");
            } else if report.issues.is_empty() {
                report.issue(format!(
                    "{} block count {} != record count {}",
                    LedgerErrorCode::E005ReportDrift.as_str(),
                    check.blocks,
                    check.records
                ));
            }
        }
        Err(err) => report.issue(format!(
            "{} {err:#}",
            LedgerErrorCode::E001StoreCorrupt.as_str()
        )),
    }

    if opts.strict {
        report.merge(status::run()?);
        for var in unknown_env_vars() {
            report.issue(format!("unrecognized env var {var}; check for a typo"));
        }
        if !report.ok {
            report.issue("strict verify failed");
        }
    }

    Ok(report)
}
