use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Open-schema attribute set: string keys to scalar JSON values.
pub type AttributeMap = BTreeMap<String, Value>;

/// Every persisted record, keyed by identity.
pub type RecordMap = BTreeMap<String, Record>;

/// Canonical merged state for one client key.
///
/// The key is serialized as `uuid` so existing tooling reading the store
/// keeps working.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "uuid")]
    pub key: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub hardware: AttributeMap,
    #[serde(default)]
    pub ip_details: AttributeMap,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl Record {
    pub fn empty(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            email: None,
            ip: None,
            user_agent: None,
            hardware: AttributeMap::new(),
            ip_details: AttributeMap::new(),
            timestamp: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_sparse_record_with_defaults() {
        let raw = json!({"uuid": "d1", "email": "a@b.com"});
        let record: Record = serde_json::from_value(raw).expect("parse");
        assert_eq!(record.key, "d1");
        assert_eq!(record.email.as_deref(), Some("a@b.com"));
        assert!(record.hardware.is_empty());
        assert!(record.ip_details.is_empty());
        assert!(record.timestamp.is_none());
    }
}
