//! In-memory key/value store backing the CRUD routes.
//!
//! Values are JSON objects. Each operation is atomic for its key; there are
//! no cross-key transactions.

use dashmap::DashMap;
use serde_json::{Map, Value};

/// Fields keep the order they were first written in.
pub type Record = Map<String, Value>;

#[derive(Debug, Default)]
pub struct DataStore {
    entries: DashMap<String, Record>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding the `example` record.
    pub fn seeded() -> Self {
        let store = Self::new();
        let mut example = Record::new();
        example.insert("field1".into(), Value::from("value1"));
        example.insert("field2".into(), Value::from("value2"));
        store.put("example", example);
        store
    }

    pub fn get(&self, key: &str) -> Option<Record> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Inserts or replaces; returns the previous value.
    pub fn put(&self, key: impl Into<String>, value: Record) -> Option<Record> {
        self.entries.insert(key.into(), value)
    }

    pub fn remove(&self, key: &str) -> Option<Record> {
        self.entries.remove(key).map(|(_, value)| value)
    }

    /// Replaces the value only when the key already exists.
    pub fn update_existing(&self, key: &str, value: Record) -> Option<Record> {
        let mut entry = self.entries.get_mut(key)?;
        *entry = value;
        Some(entry.value().clone())
    }

    /// Overlays `patch` onto the existing value field by field and returns
    /// the merged result.
    pub fn merge_existing(&self, key: &str, patch: Record) -> Option<Record> {
        let mut entry = self.entries.get_mut(key)?;
        for (field, value) in patch {
            entry.insert(field, value);
        }
        Some(entry.value().clone())
    }

    pub fn for_each(&self, mut f: impl FnMut(&str, &Record)) {
        for entry in self.entries.iter() {
            f(entry.key(), entry.value());
        }
    }

    /// All entries sorted by key.
    pub fn snapshot(&self) -> Vec<(String, Record)> {
        let mut entries = Vec::with_capacity(self.entries.len());
        self.for_each(|key, value| entries.push((key.to_string(), value.clone())));
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn merge_keeps_untouched_fields() {
        let store = DataStore::new();
        store.put("k", record(json!({"a": 1, "b": 2})));

        let merged = store.merge_existing("k", record(json!({"b": 3, "c": 4}))).unwrap();

        assert_eq!(Value::Object(merged), json!({"a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn merge_keeps_field_order() {
        let store = DataStore::new();
        store.put("k", record(json!({"zeta": 1, "alpha": 2})));

        let merged = store.merge_existing("k", record(json!({"mid": 3, "zeta": 9}))).unwrap();

        let fields: Vec<&str> = merged.keys().map(String::as_str).collect();
        assert_eq!(fields, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn update_and_merge_require_existing_key() {
        let store = DataStore::new();
        assert!(store.update_existing("missing", Record::new()).is_none());
        assert!(store.merge_existing("missing", Record::new()).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn remove_is_single_shot() {
        let store = DataStore::seeded();
        assert!(store.remove("example").is_some());
        assert!(store.remove("example").is_none());
    }

    #[test]
    fn snapshot_is_sorted() {
        let store = DataStore::new();
        store.put("b", Record::new());
        store.put("a", Record::new());
        let keys: Vec<_> = store.snapshot().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
