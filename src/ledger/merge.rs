use crate::ledger::record::{AttributeMap, Record};
use crate::ledger::sanitize::strip_reserved;

/// Partial record carried by one inbound event. `None` and blank strings
/// mean "not supplied".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordUpdate {
    pub email: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub hardware: AttributeMap,
    pub ip_details: AttributeMap,
    pub timestamp: Option<String>,
}

impl RecordUpdate {
    pub fn is_empty(&self) -> bool {
        supplied(&self.email).is_none()
            && supplied(&self.ip).is_none()
            && supplied(&self.user_agent).is_none()
            && supplied(&self.timestamp).is_none()
            && self.hardware.is_empty()
            && self.ip_details.is_empty()
    }
}

/// Fold `update` into the current record for `key`.
///
/// Scalars are overwritten only when supplied; attribute maps are a shallow
/// union where incoming keys win. Never reads the clock.
pub fn merge_records(current: Option<&Record>, key: &str, update: &RecordUpdate) -> Record {
    let mut merged = match current {
        Some(record) => record.clone(),
        None => Record::empty(key),
    };
    merged.key = key.to_string();

    overwrite(&mut merged.email, &update.email);
    overwrite(&mut merged.ip, &update.ip);
    overwrite(&mut merged.user_agent, &update.user_agent);
    overwrite(&mut merged.timestamp, &update.timestamp);

    union_into(&mut merged.hardware, &update.hardware);
    union_into(&mut merged.ip_details, &update.ip_details);

    merged.hardware = strip_reserved(std::mem::take(&mut merged.hardware));
    merged.ip_details = strip_reserved(std::mem::take(&mut merged.ip_details));
    merged
}

/// True when `before` and `after` differ in `timestamp` and nothing else.
pub fn only_timestamp_changed(before: &Record, after: &Record) -> bool {
    if before.timestamp == after.timestamp {
        return false;
    }
    let mut aligned = after.clone();
    aligned.timestamp = before.timestamp.clone();
    aligned == *before
}

fn supplied(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn overwrite(slot: &mut Option<String>, incoming: &Option<String>) {
    if let Some(value) = supplied(incoming) {
        *slot = Some(value.to_string());
    }
}

fn union_into(base: &mut AttributeMap, incoming: &AttributeMap) {
    for (k, v) in incoming {
        base.insert(k.clone(), v.clone());
    }
}
