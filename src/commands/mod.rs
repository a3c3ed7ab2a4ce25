pub mod attach;
pub mod ingest;
pub mod ingest_batch;
pub mod repair;
pub mod show;
pub mod status;
pub mod verify;

use anyhow::Result;
use serde::Serialize;

use crate::ledger::config::{LedgerConfig, load_config};
use crate::ledger::engine::{IngestOutcome, Ledger};
use crate::ledger::event::InboundEvent;
use crate::ledger::geo::{DisabledGeoLookup, GeoLookup, HttpGeoLookup};
use crate::ledger::paths::resolve_paths;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    pub fn merge(&mut self, mut other: CommandReport) {
        self.ok &= other.ok;
        self.details.append(&mut other.details);
        self.issues.append(&mut other.issues);
    }
}

pub fn open_ledger() -> Result<(LedgerConfig, Ledger)> {
    let paths = resolve_paths()?;
    let cfg = load_config()?;
    let ledger = Ledger::open(paths, &cfg)?;
    Ok((cfg, ledger))
}

pub fn geo_lookup(cfg: &LedgerConfig) -> Box<dyn GeoLookup> {
    if cfg.geo.enabled {
        Box::new(HttpGeoLookup::new(
            cfg.geo.base_url.clone(),
            cfg.geo.timeout_secs,
        ))
    } else {
        Box::new(DisabledGeoLookup)
    }
}

/// Attach lookup results when enabled, an address is known, and the caller
/// did not supply details itself. Runs before the write lock is taken.
pub fn enrich_with_geo(
    cfg: &LedgerConfig,
    lookup: &dyn GeoLookup,
    event: InboundEvent,
) -> InboundEvent {
    if !cfg.geo.enabled || !event.ip_details.is_empty() {
        return event;
    }
    let Some(address) = event.ip.clone().filter(|ip| !ip.trim().is_empty()) else {
        return event;
    };
    let details = lookup.lookup(&address).into_attributes();
    event.with_ip_details(details)
}

pub fn outcome_details(
    report: &mut CommandReport,
    outcome: &IngestOutcome,
) -> Result<()> {
    report.detail(format!("key={}", outcome.key));
    report.detail(format!("persisted={}", outcome.persisted));
    report.detail(format!("report_regenerated={}", outcome.report_regenerated));
    if let Some(warning) = &outcome.warning {
        report.detail(format!("warning={warning}"));
    }
    report.detail(format!("record={}", serde_json::to_string(&outcome.record)?));
    Ok(())
}
