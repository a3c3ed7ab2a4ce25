use anyhow::Result;

use crate::commands::verify::{self, VerifyOptions};
use crate::commands::{CommandReport, open_ledger};

#[derive(Debug, Clone, Default)]
pub struct RepairOptions {
    pub dry_run: bool,
}

pub fn run(opts: &RepairOptions) -> Result<CommandReport> {
    let (_, ledger) = open_ledger()?;
    let mut report = CommandReport::new("repair");

    if opts.dry_run {
        report.detail(format!(
            "dry-run: would regenerate {} from {}",
            ledger.paths().report_file.display(),
            ledger.paths().store_file.display()
        ));
        return Ok(report);
    }

    let blocks = ledger.regenerate_report()?;
    report.detail(format!("report regenerated blocks={blocks}"));
    report.merge(verify::run(&VerifyOptions { strict: false })?);

    Ok(report)
}
