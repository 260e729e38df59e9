//! Key/value cache with optional per-entry TTL.
//!
//! Expiry is checked on read: an expired entry is evicted and reported as a
//! miss. `purge_expired` sweeps everything at once.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: Value,
    pub timestamp: DateTime<Utc>,
    /// Lifetime in seconds; `None` never expires.
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.ttl {
            Some(ttl) => i64::try_from(ttl)
                .ok()
                .and_then(Duration::try_seconds)
                .is_some_and(|ttl| now - self.timestamp >= ttl),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cache {
    entries: BTreeMap<String, CacheEntry>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value, ttl: Option<u64>) {
        self.set_at(key, value, ttl, Utc::now());
    }

    pub fn set_at(&mut self, key: impl Into<String>, value: Value, ttl: Option<u64>, now: DateTime<Utc>) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                timestamp: now,
                ttl,
            },
        );
    }

    pub fn get(&mut self, key: &str) -> Option<Value> {
        self.get_at(key, Utc::now())
    }

    /// Looks up `key` as of `now`, evicting it when expired.
    pub fn get_at(&mut self, key: &str, now: DateTime<Utc>) -> Option<Value> {
        let entry = self.entries.get(key)?;
        if entry.is_expired(now) {
            tracing::debug!(key, "Evicting expired cache entry");
            self.entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Keys of entries that have not expired.
    pub fn keys(&self) -> Vec<String> {
        let now = Utc::now();
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Removes expired entries and returns how many were dropped.
    pub fn purge_expired(&mut self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    pub fn purge_expired_at(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries that have not expired as of `now`.
    pub fn live_len(&self, now: DateTime<Utc>) -> usize {
        self.entries
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    /// Live key/value pairs, without timestamps.
    pub fn values(&self) -> Map<String, Value> {
        let now = Utc::now();
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_then_get() {
        let mut cache = Cache::new();
        cache.set("k", json!({"a": 1}), None);
        assert_eq!(cache.get("k"), Some(json!({"a": 1})));
        assert_eq!(cache.get("other"), None);
    }

    #[test]
    fn test_expired_entry_is_evicted_on_read() {
        let mut cache = Cache::new();
        let start = Utc::now();
        cache.set_at("k", json!(1), Some(10), start);

        assert_eq!(cache.get_at("k", start + Duration::seconds(5)), Some(json!(1)));
        assert_eq!(cache.get_at("k", start + Duration::seconds(10)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_entries_without_ttl_never_expire() {
        let mut cache = Cache::new();
        let start = Utc::now();
        cache.set_at("k", json!(1), None, start);
        assert_eq!(cache.get_at("k", start + Duration::days(365)), Some(json!(1)));
    }

    #[test]
    fn test_purge_and_keys_skip_expired() {
        let mut cache = Cache::new();
        let long_ago = Utc::now() - Duration::hours(1);
        cache.set_at("stale", json!(1), Some(60), long_ago);
        cache.set("fresh", json!(2), Some(3600));
        cache.set("forever", json!(3), None);

        assert_eq!(cache.keys(), vec!["forever", "fresh"]);
        assert_eq!(cache.values().len(), 2);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.live_len(Utc::now()), 2);
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_delete_and_clear() {
        let mut cache = Cache::new();
        cache.set("a", json!(1), None);
        cache.set("b", json!(2), None);
        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_serializes_as_key_map() {
        let mut cache = Cache::new();
        cache.set("k", json!("v"), Some(5));
        let value = serde_json::to_value(&cache).unwrap();
        assert_eq!(value["k"]["value"], json!("v"));
        assert_eq!(value["k"]["ttl"], json!(5));

        let restored: Cache = serde_json::from_value(value).unwrap();
        assert_eq!(restored, cache);
    }
}
