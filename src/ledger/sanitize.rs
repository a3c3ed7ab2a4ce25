use crate::ledger::record::AttributeMap;
use serde_json::Value;

/// Keys that duplicate top-level record fields and never belong in an
/// attribute map.
pub const RESERVED_KEYS: &[&str] = &["uuid", "user_agent"];

/// Copy an untyped payload into an attribute map without reserved keys.
/// Anything other than a JSON object yields an empty map.
pub fn sanitize_attributes(raw: &Value) -> AttributeMap {
    let Some(object) = raw.as_object() else {
        return AttributeMap::new();
    };
    object
        .iter()
        .filter(|(k, _)| !is_reserved(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

pub fn strip_reserved(mut map: AttributeMap) -> AttributeMap {
    for key in RESERVED_KEYS {
        map.remove(*key);
    }
    map
}

fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn removes_reserved_keys_and_keeps_the_rest() {
        let raw = json!({"uuid": "d1", "user_agent": "ua", "cpu": "x86", "cores": 8});
        let map = sanitize_attributes(&raw);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("cpu"), Some(&json!("x86")));
        assert_eq!(map.get("cores"), Some(&json!(8)));
    }

    #[test]
    fn non_object_input_degrades_to_empty() {
        assert!(sanitize_attributes(&Value::Null).is_empty());
        assert!(sanitize_attributes(&json!([1, 2, 3])).is_empty());
        assert!(sanitize_attributes(&json!("uuid")).is_empty());
    }

    #[test]
    fn strip_reserved_leaves_input_without_reserved_keys() {
        let mut map = AttributeMap::new();
        map.insert("uuid".into(), json!("d1"));
        map.insert("gpu".into(), json!("none"));
        let out = strip_reserved(map);
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["gpu"]);
    }
}
