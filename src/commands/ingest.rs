use anyhow::Result;

use crate::commands::{CommandReport, enrich_with_geo, geo_lookup, open_ledger, outcome_details};
use crate::ledger::event::{EventKind, InboundEvent};
use crate::ledger::payload;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub kind: EventKind,
    pub key: Option<String>,
    pub email: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub hardware: Option<String>,
    pub ip_details: Option<String>,
    pub timestamp: Option<String>,
}

/// Malformed optional payloads are kept as `{"error": ...}` attributes, so
/// building an event never fails.
pub fn build_event(opts: &IngestOptions) -> InboundEvent {
    let event = match opts.kind {
        EventKind::Sighting => {
            let mut event = InboundEvent::sighting(opts.email.clone(), opts.hardware.as_deref());
            if event.hint.explicit_key.is_none() {
                event.hint.explicit_key = opts.key.clone();
            }
            event
        }
        EventKind::HardwareSighting => {
            let mut body = payload::body_from_raw(opts.hardware.as_deref());
            payload::ensure_device_key(&mut body, opts.key.as_deref());
            InboundEvent::hardware_sighting(&body)
        }
        EventKind::EmailUpdate => InboundEvent::email_update(opts.key.clone(), opts.email.clone()),
    };

    event
        .with_network(opts.ip.clone(), opts.user_agent.clone())
        .with_ip_details(payload::ip_details_from_raw(opts.ip_details.as_deref()))
        .with_timestamp(opts.timestamp.clone())
}

pub fn run(opts: &IngestOptions) -> Result<CommandReport> {
    let (cfg, ledger) = open_ledger()?;
    let mut report = CommandReport::new(format!("ingest-{}", opts.kind.as_str()));

    let event = build_event(opts);
    let event = enrich_with_geo(&cfg, geo_lookup(&cfg).as_ref(), event);
    let outcome = ledger.ingest(&event);
    outcome_details(&mut report, &outcome)?;

    Ok(report)
}
