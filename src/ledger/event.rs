use crate::ledger::identity::{IdentityHint, resolve_key};
use crate::ledger::merge::RecordUpdate;
use crate::ledger::payload::{self, parse_hardware_payload};
use crate::ledger::record::AttributeMap;
use crate::ledger::sanitize::strip_reserved;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Contact form: email plus a hardware JSON document.
    Sighting,
    /// Page-load fingerprint without an email.
    #[serde(alias = "hardware")]
    HardwareSighting,
    /// Email attached to a device that may already be known.
    #[serde(alias = "email")]
    EmailUpdate,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sighting => "sighting",
            Self::HardwareSighting => "hardware",
            Self::EmailUpdate => "email",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub kind: EventKind,
    pub hint: IdentityHint,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub hardware: AttributeMap,
    pub ip_details: AttributeMap,
    pub timestamp: Option<String>,
    pub arrival: DateTime<Utc>,
}

impl InboundEvent {
    fn base(kind: EventKind, hint: IdentityHint) -> Self {
        Self {
            kind,
            hint,
            ip: None,
            user_agent: None,
            hardware: AttributeMap::new(),
            ip_details: AttributeMap::new(),
            timestamp: None,
            arrival: Utc::now(),
        }
    }

    /// The device key travels inside the hardware document as `uuid`.
    pub fn sighting(email: Option<String>, hardware_raw: Option<&str>) -> Self {
        let parsed = parse_hardware_payload(hardware_raw);
        let mut event = Self::base(
            EventKind::Sighting,
            IdentityHint::new(parsed.device_key, email),
        );
        event.hardware = parsed.attributes;
        event
    }

    pub fn hardware_sighting(body: &Value) -> Self {
        let parsed = payload::from_value(body);
        let mut event = Self::base(
            EventKind::HardwareSighting,
            IdentityHint::new(parsed.device_key, None),
        );
        event.hardware = parsed.attributes;
        event
    }

    pub fn email_update(key: Option<String>, email: Option<String>) -> Self {
        Self::base(EventKind::EmailUpdate, IdentityHint::new(key, email))
    }

    pub fn with_network(mut self, ip: Option<String>, user_agent: Option<String>) -> Self {
        self.ip = ip;
        self.user_agent = user_agent;
        self
    }

    pub fn with_ip_details(mut self, details: AttributeMap) -> Self {
        self.ip_details = strip_reserved(details);
        self
    }

    pub fn with_timestamp(mut self, timestamp: Option<String>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn at(mut self, arrival: DateTime<Utc>) -> Self {
        self.arrival = arrival;
        self
    }

    pub fn resolve_key(&self) -> String {
        resolve_key(&self.hint, self.arrival)
    }

    pub fn to_update(&self) -> RecordUpdate {
        RecordUpdate {
            email: self.hint.email.clone(),
            ip: self.ip.clone(),
            user_agent: self.user_agent.clone(),
            hardware: strip_reserved(self.hardware.clone()),
            ip_details: strip_reserved(self.ip_details.clone()),
            timestamp: self.timestamp.clone(),
        }
    }
}

/// One line of an `ingest-batch` JSONL file.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchLine {
    pub kind: EventKind,
    #[serde(default, alias = "key")]
    pub uuid: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Either an embedded object or a raw JSON string, as forms send it.
    #[serde(default)]
    pub hardware: Option<Value>,
    #[serde(default)]
    pub ip_details: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl BatchLine {
    pub fn into_event(self) -> InboundEvent {
        let event = match self.kind {
            EventKind::Sighting => {
                let raw = match &self.hardware {
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(other) => Some(other.to_string()),
                    None => None,
                };
                let mut event = InboundEvent::sighting(self.email, raw.as_deref());
                if event.hint.explicit_key.is_none() {
                    event.hint.explicit_key = self.uuid;
                }
                event
            }
            EventKind::HardwareSighting => {
                let mut body = match self.hardware {
                    Some(Value::String(raw)) => payload::body_from_raw(Some(raw.as_str())),
                    Some(value) if value.is_object() => value,
                    _ => Value::Object(Default::default()),
                };
                payload::ensure_device_key(&mut body, self.uuid.as_deref());
                InboundEvent::hardware_sighting(&body)
            }
            EventKind::EmailUpdate => InboundEvent::email_update(self.uuid, self.email),
        };
        let ip_details = self
            .ip_details
            .as_ref()
            .map(crate::ledger::sanitize::sanitize_attributes)
            .unwrap_or_default();
        event
            .with_network(self.ip, self.user_agent)
            .with_ip_details(ip_details)
            .with_timestamp(self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sighting_takes_key_from_hardware_document() {
        let event = InboundEvent::sighting(
            Some("a@b.com".into()),
            Some(r#"{"uuid":"d1","cpu":"x86"}"#),
        );
        assert_eq!(event.resolve_key(), "d1");
        let update = event.to_update();
        assert_eq!(update.email.as_deref(), Some("a@b.com"));
        assert_eq!(update.hardware.get("cpu"), Some(&json!("x86")));
        assert!(!update.hardware.contains_key("uuid"));
    }

    #[test]
    fn sighting_without_device_key_falls_back_to_email() {
        let event = InboundEvent::sighting(Some("a@b.com".into()), Some("not json"));
        assert_eq!(event.resolve_key(), "a@b.com");
        assert!(event.hardware.contains_key("error"));
    }

    #[test]
    fn anonymous_events_key_off_arrival_time() {
        use chrono::TimeZone;
        let arrival = Utc.timestamp_opt(1_700_000_000, 0).single().expect("instant");
        let event = InboundEvent::hardware_sighting(&json!({"cpu": "x86"})).at(arrival);
        assert_eq!(event.resolve_key(), "no-uuid-1700000000.0");
    }

    #[test]
    fn email_update_carries_no_hardware() {
        let event = InboundEvent::email_update(Some("d1".into()), Some("a@b.com".into()));
        assert_eq!(event.kind, EventKind::EmailUpdate);
        assert!(event.to_update().hardware.is_empty());
    }

    #[test]
    fn batch_line_hardware_kind_uses_uuid_field() {
        let line: BatchLine = serde_json::from_value(json!({
            "kind": "hardware",
            "uuid": "d9",
            "hardware": {"gpu": "iris"},
            "ip": "198.51.100.7"
        }))
        .expect("parse");
        let event = line.into_event();
        assert_eq!(event.resolve_key(), "d9");
        assert_eq!(event.ip.as_deref(), Some("198.51.100.7"));
        assert_eq!(event.hardware.get("gpu"), Some(&json!("iris")));
    }

    #[test]
    fn batch_line_hardware_kind_without_body_keeps_uuid() {
        let line: BatchLine =
            serde_json::from_value(json!({"kind": "hardware_sighting", "uuid": "d3"}))
                .expect("parse");
        assert_eq!(line.into_event().resolve_key(), "d3");
    }

    #[test]
    fn batch_line_sighting_accepts_raw_string_hardware() {
        let line: BatchLine = serde_json::from_value(json!({
            "kind": "sighting",
            "email": "x@y.com",
            "hardware": "{\"uuid\":\"d2\",\"ram\":8}",
            "ip_details": {"city": "Lima", "uuid": "drop-me"}
        }))
        .expect("parse");
        let event = line.into_event();
        assert_eq!(event.resolve_key(), "d2");
        assert_eq!(event.hardware.get("ram"), Some(&json!(8)));
        assert!(!event.ip_details.contains_key("uuid"));
    }
}
