use crate::ledger::record::AttributeMap;
use crate::ledger::sanitize::sanitize_attributes;
use serde_json::{Value, json};

/// Hardware payload after parsing: the device key it carried (if any) and
/// the sanitized attribute map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedHardware {
    pub device_key: Option<String>,
    pub attributes: AttributeMap,
}

/// Parse a raw hardware JSON document.
///
/// Absent or blank input is an empty payload. Unparseable input becomes
/// `{"error": "..."}` so the event is still recorded.
pub fn parse_hardware_payload(raw: Option<&str>) -> ParsedHardware {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return ParsedHardware::default();
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => from_value(&value),
        Err(err) => {
            tracing::debug!(error = %err, "hardware payload is not valid JSON");
            let mut attributes = AttributeMap::new();
            attributes.insert("error".to_string(), json!(invalid_json_message("hardware", &err)));
            ParsedHardware {
                device_key: None,
                attributes,
            }
        }
    }
}

/// Decode a raw beacon body into a JSON object. Invalid JSON becomes
/// `{"error": ...}`; anything else that is not an object becomes `{}`.
pub fn body_from_raw(raw: Option<&str>) -> Value {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return json!({});
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(value) if value.is_object() => value,
        Ok(_) => json!({}),
        Err(err) => json!({ "error": invalid_json_message("hardware", &err) }),
    }
}

/// Fill in `uuid` from an out-of-band key unless the body already has one.
pub fn ensure_device_key(body: &mut Value, key: Option<&str>) {
    let Some(key) = key.filter(|k| !k.trim().is_empty()) else {
        return;
    };
    if let Some(object) = body.as_object_mut() {
        object
            .entry("uuid")
            .or_insert_with(|| Value::String(key.to_string()));
    }
}

/// Decode raw IP-details JSON into sanitized attributes. Invalid JSON is
/// kept as `{"error": ...}`; valid JSON that is not an object is dropped.
pub fn ip_details_from_raw(raw: Option<&str>) -> AttributeMap {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return AttributeMap::new();
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => {
            if !value.is_object() {
                tracing::debug!("ip details are not a JSON object, ignoring");
            }
            sanitize_attributes(&value)
        }
        Err(err) => {
            let mut attributes = AttributeMap::new();
            attributes.insert(
                "error".to_string(),
                json!(invalid_json_message("ip_details", &err)),
            );
            attributes
        }
    }
}

fn invalid_json_message(what: &str, err: &serde_json::Error) -> String {
    format!("Invalid {what} JSON: {err}")
}

/// Same as [`parse_hardware_payload`] for an already-decoded body.
pub fn from_value(value: &Value) -> ParsedHardware {
    let device_key = value
        .get("uuid")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned);
    ParsedHardware {
        device_key,
        attributes: sanitize_attributes(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_device_key_and_strips_it() {
        let parsed =
            parse_hardware_payload(Some(r#"{"uuid":"d1","user_agent":"ua","cpu":"x86"}"#));
        assert_eq!(parsed.device_key.as_deref(), Some("d1"));
        assert_eq!(parsed.attributes.len(), 1);
        assert_eq!(parsed.attributes.get("cpu"), Some(&json!("x86")));
    }

    #[test]
    fn malformed_json_becomes_error_attribute() {
        let parsed = parse_hardware_payload(Some("{cpu: x86"));
        assert!(parsed.device_key.is_none());
        let message = parsed
            .attributes
            .get("error")
            .and_then(Value::as_str)
            .expect("error attribute");
        assert!(message.starts_with("Invalid hardware JSON:"));
    }

    #[test]
    fn body_from_raw_always_yields_an_object() {
        assert_eq!(body_from_raw(None), json!({}));
        assert_eq!(body_from_raw(Some("[1]")), json!({}));
        assert!(body_from_raw(Some("{bad")).get("error").is_some());

        let mut body = body_from_raw(Some(r#"{"uuid":"keep"}"#));
        ensure_device_key(&mut body, Some("other"));
        assert_eq!(body["uuid"], "keep");

        let mut body = body_from_raw(None);
        ensure_device_key(&mut body, Some("d1"));
        assert_eq!(body["uuid"], "d1");
    }

    #[test]
    fn ip_details_keep_parse_errors_as_attribute() {
        let details = ip_details_from_raw(Some("{not json"));
        assert_eq!(details.len(), 1);
        let message = details.get("error").and_then(Value::as_str).expect("error");
        assert!(message.starts_with("Invalid ip_details JSON:"));

        let details = ip_details_from_raw(Some(r#"{"city":"Oslo","uuid":"x"}"#));
        assert_eq!(details.get("city"), Some(&json!("Oslo")));
        assert!(!details.contains_key("uuid"));

        assert!(ip_details_from_raw(Some("[1]")).is_empty());
        assert!(ip_details_from_raw(None).is_empty());
    }

    #[test]
    fn absent_or_non_object_payload_is_empty() {
        assert_eq!(parse_hardware_payload(None), ParsedHardware::default());
        assert_eq!(parse_hardware_payload(Some("  ")), ParsedHardware::default());
        assert_eq!(parse_hardware_payload(Some("[1,2]")), ParsedHardware::default());
    }
}
