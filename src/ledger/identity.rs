use chrono::{DateTime, Utc};

/// Identifying material extracted from an inbound event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityHint {
    pub explicit_key: Option<String>,
    pub email: Option<String>,
}

impl IdentityHint {
    pub fn new(explicit_key: Option<String>, email: Option<String>) -> Self {
        Self {
            explicit_key,
            email,
        }
    }
}

/// Pick the storage key: explicit device key, then email, then a key
/// synthesized from the arrival instant.
pub fn resolve_key(hint: &IdentityHint, arrival: DateTime<Utc>) -> String {
    if let Some(key) = non_empty(hint.explicit_key.as_deref()) {
        return key.to_string();
    }
    if let Some(email) = non_empty(hint.email.as_deref()) {
        return email.to_string();
    }
    synthetic_key(arrival)
}

/// `no-uuid-<epoch seconds as float>`, microsecond resolution.
pub fn synthetic_key(arrival: DateTime<Utc>) -> String {
    let secs = arrival.timestamp_micros() as f64 / 1_000_000.0;
    let mut rendered = secs.to_string();
    if !rendered.contains('.') {
        rendered.push_str(".0");
    }
    format!("no-uuid-{rendered}")
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
