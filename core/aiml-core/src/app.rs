//! AppManager - the application context handed to every UI callback.
//!
//! One `AppManager` is built at process start and owns every registry:
//!
//! - the workspace ([`DataManager`]) and the project registry ([`ProjectManager`])
//! - user sessions, one of which is active
//! - application [`Settings`], the global action log and the [`Cache`]
//!
//! ## Snapshots
//!
//! [`AppManager::export_state`] writes an [`AppSnapshot`] inside the binary
//! envelope. Import checks the snapshot version (major `1`), then restores the
//! sections it was asked for, in order. A failing section leaves the earlier
//! ones applied.

use crate::binary::{self, BinaryKind};
use crate::cache::Cache;
use crate::error::{AimlError, Result};
use crate::persist;
use crate::project::{Project, ProjectManager, ProjectSummary};
use crate::session::{HistoryEntry, Session};
use crate::settings::Settings;
use crate::storage::StorageConfig;
use crate::table::Table;
use crate::workspace::{DataManager, WorkspaceSnapshot};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Version written into every [`AppSnapshot`].
pub const APP_STATE_VERSION: &str = "1.0";

const COMPATIBLE_VERSION_PREFIX: &str = "1.";

/// User id of the session created with every `AppManager`.
pub const DEFAULT_SESSION_USER: &str = "default";

// ═══════════════════════════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════════════════════════

/// One entry of the global action log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    #[serde(default)]
    pub details: Map<String, Value>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub include_sessions: bool,
    pub include_data: bool,
    pub include_projects: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_sessions: true,
            include_data: false,
            include_projects: false,
        }
    }
}

impl ExportOptions {
    pub fn everything() -> Self {
        Self {
            include_sessions: true,
            include_data: true,
            include_projects: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    pub restore_sessions: bool,
    pub restore_data: bool,
    /// Extend settings, history, cache and sessions instead of replacing them.
    pub merge: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            restore_sessions: true,
            restore_data: false,
            merge: false,
        }
    }
}

fn legacy_version() -> String {
    "1.0".to_string()
}

/// Top-level application snapshot. Cache entries are stored as plain values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSnapshot {
    #[serde(default = "legacy_version")]
    pub version: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(default)]
    pub action_history: Vec<ActionEntry>,
    #[serde(default)]
    pub cache: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sessions: Option<BTreeMap<String, Session>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_state: Option<WorkspaceSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<ProjectSummary>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub total: usize,
    pub active_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataStatus {
    pub datasets: usize,
    pub active_dataset: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectsStatus {
    pub total: usize,
    pub active: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStatus {
    pub size: usize,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionsStatus {
    pub total: usize,
    pub logging: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSummary {
    pub sessions: SessionStatus,
    pub data: DataStatus,
    pub projects: ProjectsStatus,
    pub cache: CacheStatus,
    pub actions: ActionsStatus,
}

fn details<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// AppManager
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct AppManager {
    storage: StorageConfig,
    data: DataManager,
    projects: ProjectManager,
    sessions: BTreeMap<String, Session>,
    active_session_id: Option<String>,
    settings: Settings,
    action_history: Vec<ActionEntry>,
    cache: Cache,
}

impl Default for AppManager {
    fn default() -> Self {
        Self::new(StorageConfig::default())
    }
}

impl AppManager {
    /// Creates the context with an empty workspace and one active
    /// `default` session. Projects are not read from disk until
    /// [`ProjectManager::load_all_projects`] is called.
    pub fn new(storage: StorageConfig) -> Self {
        let session = Session::new(DEFAULT_SESSION_USER);
        let session_id = session.id().to_string();
        Self {
            projects: ProjectManager::with_storage(&storage),
            storage,
            data: DataManager::new(),
            sessions: BTreeMap::from([(session_id.clone(), session)]),
            active_session_id: Some(session_id),
            settings: Settings::default(),
            action_history: Vec::new(),
            cache: Cache::new(),
        }
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn data_manager(&self) -> &DataManager {
        &self.data
    }

    pub fn data_manager_mut(&mut self) -> &mut DataManager {
        &mut self.data
    }

    pub fn project_manager(&self) -> &ProjectManager {
        &self.projects
    }

    pub fn project_manager_mut(&mut self) -> &mut ProjectManager {
        &mut self.projects
    }

    /// Borrows the workspace and the project registry together, for the
    /// bridge operations on [`DataManager`].
    pub fn workspace_and_projects_mut(&mut self) -> (&mut DataManager, &mut ProjectManager) {
        (&mut self.data, &mut self.projects)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn create_session(&mut self, user_id: &str) -> &Session {
        let session = Session::new(user_id);
        let id = session.id().to_string();
        self.sessions.insert(id.clone(), session);
        self.log_action(
            "session_created",
            details([
                ("session_id", Value::from(id.as_str())),
                ("user_id", Value::from(user_id)),
            ]),
            None,
        );
        &self.sessions[&id]
    }

    /// The given session, or the active one when `session_id` is `None`.
    pub fn session(&self, session_id: Option<&str>) -> Option<&Session> {
        let id = session_id.or(self.active_session_id.as_deref())?;
        self.sessions.get(id)
    }

    pub fn session_mut(&mut self, session_id: Option<&str>) -> Option<&mut Session> {
        let id = session_id
            .map(str::to_string)
            .or_else(|| self.active_session_id.clone())?;
        self.sessions.get_mut(&id)
    }

    /// Activates a session and refreshes its activity time. Unknown ids
    /// return `false`.
    pub fn set_active_session(&mut self, session_id: &str) -> bool {
        let Some(session) = self.sessions.get_mut(session_id) else {
            return false;
        };
        session.touch();
        self.active_session_id = Some(session_id.to_string());
        true
    }

    pub fn active_session_id(&self) -> Option<&str> {
        self.active_session_id.as_deref()
    }

    pub fn list_sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Removes a session. If it was active, the first remaining session (by
    /// id) becomes active.
    pub fn remove_session(&mut self, session_id: &str) -> bool {
        if self.sessions.remove(session_id).is_none() {
            return false;
        }
        if self.active_session_id.as_deref() == Some(session_id) {
            self.active_session_id = self.sessions.keys().next().cloned();
        }
        self.log_action(
            "session_removed",
            details([("session_id", Value::from(session_id))]),
            None,
        );
        true
    }

    /// Removes sessions idle for longer than `timeout_secs`. Returns how many
    /// were removed.
    pub fn cleanup_inactive_sessions(&mut self, timeout_secs: u64) -> usize {
        self.cleanup_inactive_sessions_at(timeout_secs, Utc::now())
    }

    pub fn cleanup_inactive_sessions_at(&mut self, timeout_secs: u64, now: DateTime<Utc>) -> usize {
        let timeout = Duration::try_seconds(i64::try_from(timeout_secs).unwrap_or(i64::MAX))
            .unwrap_or(Duration::MAX);
        let expired: Vec<String> = self
            .sessions
            .values()
            .filter(|session| session.idle_for(now) > timeout)
            .map(|session| session.id().to_string())
            .collect();

        for id in &expired {
            self.remove_session(id);
        }
        if !expired.is_empty() {
            tracing::info!(removed = expired.len(), "Cleaned up inactive sessions");
        }
        expired.len()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Settings
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    pub fn setting_or(&self, key: &str, default: Value) -> Value {
        self.settings.get_or(key, default)
    }

    pub fn set_setting(&mut self, key: &str, value: Value) {
        let rendered = match &value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        self.settings.set(key, value);
        self.log_action(
            "setting_changed",
            details([("key", Value::from(key)), ("value", Value::from(rendered))]),
            None,
        );
    }

    pub fn update_settings(&mut self, values: Map<String, Value>) {
        let count = values.len();
        self.settings.update(values);
        self.log_action("settings_updated", details([("count", Value::from(count))]), None);
    }

    pub fn reset_settings(&mut self) {
        self.settings.reset();
        self.log_action("settings_reset", Map::new(), None);
    }

    /// Writes settings to `path` (JSON, or YAML for `.yaml`/`.yml`).
    pub fn export_settings(&mut self, path: &Path) -> Result<()> {
        self.settings.export_to(path)?;
        self.log_action(
            "settings_exported",
            details([("path", Value::from(path.display().to_string()))]),
            None,
        );
        Ok(())
    }

    /// Merges settings from `path` over the current ones.
    pub fn import_settings(&mut self, path: &Path) -> Result<()> {
        self.settings.import_from(path)?;
        self.log_action(
            "settings_imported",
            details([("path", Value::from(path.display().to_string()))]),
            None,
        );
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Action Log
    // ─────────────────────────────────────────────────────────────────────────────

    /// Records an action globally and in the session's history (the active
    /// session when `session_id` is `None`). Does nothing while the
    /// `log_actions` setting is off.
    pub fn log_action(&mut self, action: &str, details: Map<String, Value>, session_id: Option<&str>) {
        if !self.settings.log_actions() {
            return;
        }
        let session_id = session_id
            .map(str::to_string)
            .or_else(|| self.active_session_id.clone());

        if let Some(session) = session_id.as_deref().and_then(|id| self.sessions.get_mut(id)) {
            session.add_to_history(action, details.clone());
        }
        self.action_history.push(ActionEntry {
            timestamp: Utc::now(),
            action: action.to_string(),
            details,
            session_id,
        });
    }

    /// Filters by action type and session, then keeps the last `limit`
    /// entries. A limit of zero means no limit.
    pub fn action_history(
        &self,
        limit: Option<usize>,
        action_type: Option<&str>,
        session_id: Option<&str>,
    ) -> Vec<&ActionEntry> {
        let matching: Vec<&ActionEntry> = self
            .action_history
            .iter()
            .filter(|entry| action_type.map_or(true, |t| entry.action == t))
            .filter(|entry| session_id.map_or(true, |id| entry.session_id.as_deref() == Some(id)))
            .collect();
        match limit {
            Some(limit) if limit > 0 && limit < matching.len() => {
                matching[matching.len() - limit..].to_vec()
            }
            _ => matching,
        }
    }

    /// Clears the log and session histories, or only those of `session_id`.
    pub fn clear_action_history(&mut self, session_id: Option<&str>) {
        match session_id {
            Some(id) => {
                self.action_history
                    .retain(|entry| entry.session_id.as_deref() != Some(id));
                if let Some(session) = self.sessions.get_mut(id) {
                    session.clear_history();
                }
            }
            None => {
                self.action_history.clear();
                for session in self.sessions.values_mut() {
                    session.clear_history();
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Cache
    // ─────────────────────────────────────────────────────────────────────────────

    /// Stores a value unless the `cache_enabled` setting is off.
    pub fn cache_set(&mut self, key: &str, value: Value, ttl: Option<u64>) {
        if !self.settings.cache_enabled() {
            tracing::debug!(key, "Cache disabled, dropping write");
            return;
        }
        self.cache.set(key, value, ttl);
    }

    pub fn cache_get(&mut self, key: &str) -> Option<Value> {
        self.cache.get(key)
    }

    pub fn cache_get_or(&mut self, key: &str, default: Value) -> Value {
        self.cache.get(key).unwrap_or(default)
    }

    pub fn cache_delete(&mut self, key: &str) -> bool {
        self.cache.delete(key)
    }

    pub fn cache_clear(&mut self) {
        self.cache.clear();
        self.log_action("cache_cleared", Map::new(), None);
    }

    pub fn cache_keys(&self) -> Vec<String> {
        self.cache.keys()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Snapshots
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn snapshot(&self, options: ExportOptions) -> AppSnapshot {
        AppSnapshot {
            version: APP_STATE_VERSION.to_string(),
            timestamp: Utc::now(),
            settings: self.settings.to_map(),
            action_history: self.action_history.clone(),
            cache: self.cache.values(),
            sessions: options.include_sessions.then(|| self.sessions.clone()),
            active_session_id: if options.include_sessions {
                self.active_session_id.clone()
            } else {
                None
            },
            data_state: options.include_data.then(|| self.data.export_all_state()),
            projects: options
                .include_projects
                .then(|| self.projects.list_projects().map(Project::summary).collect()),
        }
    }

    pub fn export_state(&mut self, path: &Path, options: ExportOptions) -> Result<String> {
        let bytes = binary::encode(BinaryKind::AppState, &self.snapshot(options))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs_err::create_dir_all(parent)
                .map_err(|e| AimlError::io("creating state directory", e))?;
        }
        persist::atomic_write(path, &bytes)?;

        self.log_action(
            "state_exported",
            details([("path", Value::from(path.display().to_string()))]),
            None,
        );
        tracing::info!(path = %path.display(), "Exported application state");
        Ok(format!("State exported to {}", path.display()))
    }

    pub fn import_state(&mut self, path: &Path, options: ImportOptions) -> Result<String> {
        let bytes = persist::read_bytes(path)?;
        let snapshot: AppSnapshot = binary::decode(BinaryKind::AppState, &bytes)?;
        self.restore(snapshot, options)?;

        self.log_action(
            "state_imported",
            details([("path", Value::from(path.display().to_string()))]),
            None,
        );
        tracing::info!(path = %path.display(), "Imported application state");
        Ok(format!("State imported from {}", path.display()))
    }

    /// Applies a decoded snapshot. Requires a `1.x` version.
    pub fn restore(&mut self, snapshot: AppSnapshot, options: ImportOptions) -> Result<()> {
        if !snapshot.version.starts_with(COMPATIBLE_VERSION_PREFIX) {
            return Err(AimlError::IncompatibleVersion {
                found: snapshot.version,
                expected: format!("{}x", COMPATIBLE_VERSION_PREFIX),
            });
        }

        if options.merge {
            self.settings.update(snapshot.settings);
            self.action_history.extend(snapshot.action_history);
        } else {
            if snapshot.settings.is_empty() {
                self.settings.reset();
            } else {
                self.settings.replace(snapshot.settings);
            }
            self.action_history = snapshot.action_history;
            self.cache.clear();
            for (key, value) in snapshot.cache {
                self.cache.set(key, value, None);
            }
        }

        if let (true, Some(sessions)) = (options.restore_sessions, snapshot.sessions) {
            if !options.merge {
                self.sessions.clear();
                self.active_session_id = None;
            }
            self.sessions.extend(sessions);
            if let Some(id) = snapshot
                .active_session_id
                .filter(|id| self.sessions.contains_key(id))
            {
                self.active_session_id = Some(id);
            } else if self.active_session_id.is_none() {
                self.active_session_id = self.sessions.keys().next().cloned();
            }
        }

        if let (true, Some(data_state)) = (options.restore_data, snapshot.data_state) {
            self.data.import_all_state(&data_state)?;
        }
        Ok(())
    }

    /// Writes a full snapshot to [`StorageConfig::state_file`].
    pub fn save_state(&mut self) -> Result<String> {
        let path = self.storage.state_file();
        self.export_state(&path, ExportOptions::everything())
    }

    /// Restores sessions and the workspace from [`StorageConfig::state_file`].
    pub fn load_state(&mut self) -> Result<String> {
        let path = self.storage.state_file();
        self.import_state(
            &path,
            ImportOptions {
                restore_sessions: true,
                restore_data: true,
                merge: false,
            },
        )
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Quick Access
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn current_dataset(&self) -> Option<Table> {
        self.data.get_dataset(None)
    }

    pub fn current_project(&self) -> Option<&Project> {
        self.projects.active_project()
    }

    pub fn session_history(&self, session_id: Option<&str>) -> &[HistoryEntry] {
        self.session(session_id)
            .map(Session::history)
            .unwrap_or_default()
    }

    pub fn status_summary(&self) -> StatusSummary {
        StatusSummary {
            sessions: SessionStatus {
                total: self.sessions.len(),
                active_id: self.active_session_id.clone(),
            },
            data: DataStatus {
                datasets: self.data.len(),
                active_dataset: self.data.active_dataset_name().map(str::to_string),
            },
            projects: ProjectsStatus {
                total: self.projects.len(),
                active: self.projects.active_project_id().map(str::to_string),
            },
            cache: CacheStatus {
                size: self.cache.live_len(Utc::now()),
                enabled: self.settings.cache_enabled(),
            },
            actions: ActionsStatus {
                total: self.action_history.len(),
                logging: self.settings.log_actions(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn app(temp: &TempDir) -> AppManager {
        AppManager::new(StorageConfig::with_root(temp.path().to_path_buf()))
    }

    fn numbers(values: &[i64]) -> Table {
        Table::from_columns(vec![("A", values.iter().map(|v| json!(v)).collect())]).unwrap()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Session Tests
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_new_has_active_default_session() {
        let temp = TempDir::new().unwrap();
        let app = app(&temp);
        let session = app.session(None).unwrap();
        assert_eq!(session.user_id(), "default");
        assert_eq!(app.list_sessions().count(), 1);
    }

    #[test]
    fn test_create_session_does_not_change_active() {
        let temp = TempDir::new().unwrap();
        let mut app = app(&temp);
        let first = app.active_session_id().unwrap().to_string();
        let id = app.create_session("alice").id().to_string();

        assert_eq!(app.active_session_id(), Some(first.as_str()));
        assert!(app.set_active_session(&id));
        assert_eq!(app.session(None).unwrap().user_id(), "alice");
        assert!(!app.set_active_session("session-missing"));
        assert!(app.session(Some("session-missing")).is_none());
    }

    #[test]
    fn test_remove_active_session_falls_back() {
        let temp = TempDir::new().unwrap();
        let mut app = app(&temp);
        let first = app.active_session_id().unwrap().to_string();
        let second = app.create_session("bob").id().to_string();

        assert!(app.remove_session(&first));
        assert_eq!(app.active_session_id(), Some(second.as_str()));
        assert!(!app.remove_session(&first));
        assert!(app.remove_session(&second));
        assert_eq!(app.active_session_id(), None);
    }

    #[test]
    fn test_cleanup_removes_only_idle_sessions() {
        let temp = TempDir::new().unwrap();
        let mut app = app(&temp);
        let stale = app.create_session("stale").id().to_string();
        let now = Utc::now();
        app.session_mut(Some(&stale))
            .unwrap()
            .set_last_active(now - Duration::hours(2));

        assert_eq!(app.cleanup_inactive_sessions_at(3600, now), 1);
        assert!(app.session(Some(&stale)).is_none());
        assert_eq!(app.list_sessions().count(), 1);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Settings & Action Log Tests
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_setting_changes_are_logged() {
        let temp = TempDir::new().unwrap();
        let mut app = app(&temp);
        app.set_setting("theme", json!("dark"));

        assert_eq!(app.setting("theme"), Some(&json!("dark")));
        let history = app.action_history(None, Some("setting_changed"), None);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].details["value"], json!("dark"));
        assert_eq!(app.session_history(None).len(), 1);
    }

    #[test]
    fn test_log_actions_off_is_noop() {
        let temp = TempDir::new().unwrap();
        let mut app = app(&temp);
        app.set_setting("log_actions", json!(false));
        let before = app.action_history(None, None, None).len();

        app.log_action("custom", Map::new(), None);
        app.reset_settings();
        // reset turns logging back on before the entry is written
        assert_eq!(app.action_history(None, None, None).len(), before + 1);
        assert!(app.action_history(None, Some("custom"), None).is_empty());
    }

    #[test]
    fn test_action_history_filters_and_limit() {
        let temp = TempDir::new().unwrap();
        let mut app = app(&temp);
        let other = app.create_session("other").id().to_string();
        for i in 0..5 {
            app.log_action("step", details([("i", json!(i))]), None);
        }
        app.log_action("step", Map::new(), Some(&other));

        let last_two = app.action_history(Some(2), Some("step"), None);
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[0].details["i"], json!(4));
        assert_eq!(app.action_history(Some(0), Some("step"), None).len(), 6);
        assert_eq!(app.action_history(None, None, Some(&other)).len(), 1);
        assert_eq!(app.session_history(Some(&other)).len(), 1);
    }

    #[test]
    fn test_clear_history_for_one_session() {
        let temp = TempDir::new().unwrap();
        let mut app = app(&temp);
        let main = app.active_session_id().unwrap().to_string();
        let other = app.create_session("other").id().to_string();
        app.log_action("a", Map::new(), Some(&other));

        app.clear_action_history(Some(&other));
        assert!(app.action_history(None, None, Some(&other)).is_empty());
        assert!(app.session_history(Some(&other)).is_empty());
        assert!(!app.action_history(None, None, Some(&main)).is_empty());

        app.clear_action_history(None);
        assert!(app.action_history(None, None, None).is_empty());
        assert!(app.session_history(Some(&main)).is_empty());
    }

    #[test]
    fn test_settings_file_roundtrip() {
        let temp = TempDir::new().unwrap();
        let mut app = app(&temp);
        let path = app.storage().settings_file();
        app.set_setting("precision", json!(5));
        app.export_settings(&path).unwrap();

        let mut fresh = AppManager::new(StorageConfig::with_root(temp.path().to_path_buf()));
        fresh.import_settings(&path).unwrap();
        assert_eq!(fresh.setting("precision"), Some(&json!(5)));
        assert_eq!(fresh.action_history(None, Some("settings_imported"), None).len(), 1);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Cache Tests
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_cache_disabled_drops_writes() {
        let temp = TempDir::new().unwrap();
        let mut app = app(&temp);
        app.set_setting("cache_enabled", json!(false));
        app.cache_set("k", json!(1), None);
        assert!(app.cache_get("k").is_none());
        assert_eq!(app.cache_get_or("k", json!("dflt")), json!("dflt"));
    }

    #[test]
    fn test_status_counts_only_live_cache_entries() {
        let temp = TempDir::new().unwrap();
        let mut app = app(&temp);
        app.cache_set("fresh", json!(1), Some(3600));
        app.cache
            .set_at("stale", json!(2), Some(60), Utc::now() - Duration::hours(1));

        assert_eq!(app.status_summary().cache.size, 1);
    }

    #[test]
    fn test_cache_clear_is_logged() {
        let temp = TempDir::new().unwrap();
        let mut app = app(&temp);
        app.cache_set("k", json!(1), Some(60));
        assert_eq!(app.cache_keys(), vec!["k"]);
        assert!(app.cache_delete("k"));
        app.cache_set("k", json!(1), None);
        app.cache_clear();
        assert!(app.cache_keys().is_empty());
        assert_eq!(app.action_history(None, Some("cache_cleared"), None).len(), 1);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Snapshot Tests
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_snapshot_respects_options() {
        let temp = TempDir::new().unwrap();
        let app = app(&temp);
        let minimal = app.snapshot(ExportOptions {
            include_sessions: false,
            include_data: false,
            include_projects: false,
        });
        assert!(minimal.sessions.is_none());
        assert!(minimal.active_session_id.is_none());
        assert!(minimal.data_state.is_none());

        let full = app.snapshot(ExportOptions::everything());
        assert_eq!(full.sessions.unwrap().len(), 1);
        assert_eq!(full.projects.unwrap().len(), 0);
        assert_eq!(full.data_state.unwrap().version, "2.0");
    }

    #[test]
    fn test_restore_rejects_other_major_version() {
        let temp = TempDir::new().unwrap();
        let mut app = app(&temp);
        let mut snapshot = app.snapshot(ExportOptions::default());
        snapshot.version = "2.0".to_string();
        snapshot.settings.insert("theme".to_string(), json!("dark"));

        let err = app.restore(snapshot, ImportOptions::default()).unwrap_err();
        assert!(matches!(err, AimlError::IncompatibleVersion { .. }));
        assert_eq!(app.setting("theme"), Some(&json!("light")));
    }

    #[test]
    fn test_merge_import_keeps_existing_sessions() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.bin");
        let mut source = app(&temp);
        source.create_session("carol");
        source.export_state(&path, ExportOptions::default()).unwrap();

        let mut target = app(&temp);
        let own = target.active_session_id().unwrap().to_string();
        target
            .import_state(
                &path,
                ImportOptions {
                    merge: true,
                    ..ImportOptions::default()
                },
            )
            .unwrap();
        assert_eq!(target.list_sessions().count(), 3);
        assert!(target.session(Some(&own)).is_some());
    }

    #[test]
    fn test_merge_import_leaves_cache_untouched() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.bin");
        let mut source = app(&temp);
        source.cache_set("shared", json!("from-snapshot"), None);
        source.cache_set("only_snapshot", json!(1), None);
        source.export_state(&path, ExportOptions::default()).unwrap();

        let mut target = app(&temp);
        target.cache_set("shared", json!("local"), None);
        target
            .import_state(
                &path,
                ImportOptions {
                    merge: true,
                    ..ImportOptions::default()
                },
            )
            .unwrap();
        assert_eq!(target.cache_get("shared"), Some(json!("local")));
        assert!(target.cache_get("only_snapshot").is_none());

        target.import_state(&path, ImportOptions::default()).unwrap();
        assert_eq!(target.cache_get("shared"), Some(json!("from-snapshot")));
        assert_eq!(target.cache_get("only_snapshot"), Some(json!(1)));
    }

    #[test]
    fn test_save_and_load_state_restore_workspace() {
        let temp = TempDir::new().unwrap();
        let mut app = app(&temp);
        app.data_manager_mut().add_dataset("t", &numbers(&[1, 2, 3]), "", "");
        app.data_manager_mut().set_active_dataset("t");
        app.cache_set("answer", json!(42), None);
        app.save_state().unwrap();

        let mut fresh = AppManager::new(StorageConfig::with_root(temp.path().to_path_buf()));
        fresh.load_state().unwrap();
        assert_eq!(fresh.current_dataset().unwrap().n_rows(), 3);
        assert_eq!(fresh.cache_get("answer"), Some(json!(42)));
        assert_eq!(fresh.active_session_id(), app.active_session_id());

        let status = fresh.status_summary();
        assert_eq!(status.data.datasets, 1);
        assert_eq!(status.data.active_dataset.as_deref(), Some("t"));
        assert_eq!(status.cache.size, 1);
        assert!(status.actions.logging);
    }

    #[test]
    fn test_import_missing_state_file_fails() {
        let temp = TempDir::new().unwrap();
        let mut app = app(&temp);
        assert!(matches!(app.load_state(), Err(AimlError::FileNotFound(_))));
    }
}
