use anyhow::Result;

use crate::commands::{CommandReport, open_ledger};

#[derive(Debug, Clone, Default)]
pub struct ShowOptions {
    pub key: Option<String>,
}

pub fn run(opts: &ShowOptions) -> Result<CommandReport> {
    let (_, ledger) = open_ledger()?;
    let mut report = CommandReport::new("show");

    match opts.key.as_deref() {
        Some(key) => match ledger.lookup(key) {
            Some(record) => report.detail(serde_json::to_string_pretty(&record)?),
            None => report.issue(format!("no record for key {key}")),
        },
        None => {
            let records = ledger.records();
            report.detail(format!("records={}", records.len()));
            for record in records.values() {
                report.detail(serde_json::to_string(record)?);
            }
        }
    }

    Ok(report)
}
