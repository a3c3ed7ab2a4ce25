use crate::ledger::record::Record;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Process-lifetime view of records seen by this process. Never
/// authoritative: the record store wins whenever the two disagree.
#[derive(Debug, Default)]
pub struct SessionCache {
    entries: Mutex<HashMap<String, Record>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Record>> {
        // A poisoned cache only means another thread panicked mid-insert;
        // the map itself is still usable.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<Record> {
        self.entries().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries().contains_key(key)
    }

    pub fn insert(&self, record: Record) {
        self.entries().insert(record.key.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instances_are_isolated() {
        let a = SessionCache::new();
        let b = SessionCache::new();
        a.insert(Record::empty("d1"));

        assert!(a.contains("d1"));
        assert!(!b.contains("d1"));
        assert_eq!(a.len(), 1);
        assert!(b.is_empty());
    }

    #[test]
    fn insert_replaces_existing_entry() {
        let cache = SessionCache::new();
        cache.insert(Record::empty("d1"));
        let mut newer = Record::empty("d1");
        newer.email = Some("a@b.com".into());
        cache.insert(newer);

        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get("d1").and_then(|r| r.email).as_deref(),
            Some("a@b.com")
        );
    }
}
