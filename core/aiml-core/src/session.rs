//! Per-user session state: a free-form data bag, session settings and an
//! action history.
//!
//! Lookups never fail; missing keys yield `None` or the caller's default.
//! Every mutator refreshes `last_active`, which drives timeout cleanup in
//! [`crate::app::AppManager::cleanup_inactive_sessions`].

use crate::error::{AimlError, Result};
use crate::ids;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// User id assigned when a session is created without one.
pub const ANONYMOUS_USER: &str = "anonymous";

fn anonymous() -> String {
    ANONYMOUS_USER.to_string()
}

/// One action recorded in a session's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    #[serde(default)]
    pub details: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default = "ids::session_id")]
    id: String,
    #[serde(default = "anonymous")]
    user_id: String,
    #[serde(rename = "created", default = "Utc::now")]
    created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    last_active: DateTime<Utc>,
    #[serde(default)]
    data: Map<String, Value>,
    #[serde(default)]
    settings: Map<String, Value>,
    #[serde(default)]
    history: Vec<HistoryEntry>,
}

impl Session {
    /// Creates a session with a fresh id.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self::with_id(ids::session_id(), user_id)
    }

    pub fn with_id(id: impl Into<String>, user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            created_at: now,
            last_active: now,
            data: Map::new(),
            settings: Map::new(),
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        self.last_active
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn settings(&self) -> &Map<String, Value> {
        &self.settings
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Data & Settings
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn get_data(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn get_data_or(&self, key: &str, default: Value) -> Value {
        self.data.get(key).cloned().unwrap_or(default)
    }

    pub fn set_data(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
        self.touch();
    }

    pub fn get_setting(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    pub fn get_setting_or(&self, key: &str, default: Value) -> Value {
        self.settings.get(key).cloned().unwrap_or(default)
    }

    pub fn set_setting(&mut self, key: impl Into<String>, value: Value) {
        self.settings.insert(key.into(), value);
        self.touch();
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Activity
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn add_to_history(&mut self, action: impl Into<String>, details: Map<String, Value>) {
        self.history.push(HistoryEntry {
            timestamp: Utc::now(),
            action: action.into(),
            details,
        });
        self.touch();
    }

    pub(crate) fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Refreshes `last_active` to now.
    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    /// How long the session has been idle as of `now`. Never negative.
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_active).max(Duration::zero())
    }

    #[cfg(test)]
    pub(crate) fn set_last_active(&mut self, at: DateTime<Utc>) {
        self.last_active = at;
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Serialization
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn to_json_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| AimlError::json("serializing session", e))
    }

    /// Rebuilds a session; absent fields take their defaults.
    pub fn from_json_value(value: &Value) -> Result<Self> {
        Self::deserialize(value).map_err(|e| AimlError::json("parsing session", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_session_defaults() {
        let session = Session::new(ANONYMOUS_USER);
        assert!(session.id().starts_with("session-"));
        assert_eq!(session.user_id(), "anonymous");
        assert!(session.data().is_empty());
        assert!(session.history().is_empty());
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Data Tests
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_missing_keys_yield_defaults() {
        let session = Session::new("u");
        assert!(session.get_data("nope").is_none());
        assert_eq!(session.get_data_or("nope", json!(7)), json!(7));
        assert_eq!(session.get_setting_or("theme", json!("dark")), json!("dark"));
    }

    #[test]
    fn test_mutators_refresh_last_active() {
        let mut session = Session::new("u");
        let stale = Utc::now() - Duration::hours(2);
        session.set_last_active(stale);

        session.set_data("k", json!(1));
        assert!(session.last_active() > stale);

        session.set_last_active(stale);
        session.set_setting("theme", json!("dark"));
        assert!(session.last_active() > stale);

        session.set_last_active(stale);
        session.add_to_history("clicked", Map::new());
        assert!(session.last_active() > stale);
        assert_eq!(session.history()[0].action, "clicked");
    }

    #[test]
    fn test_idle_for_is_never_negative() {
        let session = Session::new("u");
        let earlier = session.last_active() - Duration::seconds(30);
        assert_eq!(session.idle_for(earlier), Duration::zero());
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Serialization Tests
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_json_roundtrip() {
        let mut session = Session::with_id("session-abc", "alice");
        session.set_data("filters", json!({"a": [1, 2]}));
        session.set_setting("precision", json!(4));
        session.add_to_history("login", Map::new());

        let restored = Session::from_json_value(&session.to_json_value().unwrap()).unwrap();
        assert_eq!(restored, session);
    }

    #[test]
    fn test_json_uses_created_field_name() {
        let value = Session::new("u").to_json_value().unwrap();
        assert!(value.get("created").is_some());
        assert!(value.get("created_at").is_none());
    }

    #[test]
    fn test_from_json_fills_missing_fields() {
        let restored = Session::from_json_value(&json!({"id": "session-x"})).unwrap();
        assert_eq!(restored.id(), "session-x");
        assert_eq!(restored.user_id(), "anonymous");
        assert!(restored.settings().is_empty());
    }
}
