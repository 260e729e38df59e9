//! Storage configuration and path management for AIML Dash.
//!
//! `StorageConfig` is the single place that decides where project files,
//! settings, state snapshots and logs live on disk.
//!
//! Production code uses `StorageConfig::default()` which points to
//! `~/.aiml_dash/` (or `$AIML_DASH_HOME` when set). Tests use
//! `StorageConfig::with_root(temp_dir)` for isolation.

use std::path::{Path, PathBuf};

/// Environment variable that overrides the default storage root.
pub const ROOT_ENV_VAR: &str = "AIML_DASH_HOME";

/// Central configuration for all AIML Dash storage paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Root directory for all data (default: ~/.aiml_dash)
    root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        if let Some(root) = std::env::var_os(ROOT_ENV_VAR).filter(|v| !v.is_empty()) {
            return Self {
                root: PathBuf::from(root),
            };
        }
        let home = dirs::home_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            root: home.join(".aiml_dash"),
        }
    }
}

impl StorageConfig {
    /// Creates a StorageConfig with a custom root directory.
    /// Used for testing with temp directories.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Directories
    // ─────────────────────────────────────────────────────────────────────────────

    /// Path to projects/ directory (one JSON file per project).
    pub fn projects_dir(&self) -> PathBuf {
        self.root.join("projects")
    }

    /// Path to app/ directory (settings and state snapshots).
    pub fn app_dir(&self) -> PathBuf {
        self.root.join("app")
    }

    /// Path to logs/ directory (rolling log files).
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Files
    // ─────────────────────────────────────────────────────────────────────────────

    /// Path to settings.json (exported application settings).
    pub fn settings_file(&self) -> PathBuf {
        self.app_dir().join("settings.json")
    }

    /// Path to state.bin (binary application snapshot).
    pub fn state_file(&self) -> PathBuf {
        self.app_dir().join("state.bin")
    }

    /// File name used when persisting a project into the projects directory.
    /// Example: `proj-1a2b3c4d_Churn_Model.json`
    pub fn project_file_name(project_id: &str, project_name: &str) -> String {
        format!("{}_{}.json", project_id, project_name.replace(' ', "_"))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Directory Creation
    // ─────────────────────────────────────────────────────────────────────────────

    /// Ensures the root directory and standard subdirectories exist.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.projects_dir())?;
        std::fs::create_dir_all(self.app_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_with_root_sets_custom_path() {
        let config = StorageConfig::with_root(PathBuf::from("/tmp/test-aiml"));
        assert_eq!(config.root(), Path::new("/tmp/test-aiml"));
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Path Tests
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_projects_dir_path() {
        let config = StorageConfig::with_root(PathBuf::from("/tmp/aiml"));
        assert_eq!(config.projects_dir(), PathBuf::from("/tmp/aiml/projects"));
    }

    #[test]
    fn test_settings_and_state_live_under_app_dir() {
        let config = StorageConfig::with_root(PathBuf::from("/tmp/aiml"));
        assert_eq!(
            config.settings_file(),
            PathBuf::from("/tmp/aiml/app/settings.json")
        );
        assert_eq!(config.state_file(), PathBuf::from("/tmp/aiml/app/state.bin"));
    }

    #[test]
    fn test_project_file_name_replaces_spaces() {
        assert_eq!(
            StorageConfig::project_file_name("proj-1234abcd", "Churn Model v2"),
            "proj-1234abcd_Churn_Model_v2.json"
        );
    }

    #[test]
    fn test_ensure_dirs_creates_structure() {
        let temp = TempDir::new().unwrap();
        let config = StorageConfig::with_root(temp.path().join("root"));

        config.ensure_dirs().unwrap();

        assert!(config.root().exists());
        assert!(config.projects_dir().exists());
        assert!(config.app_dir().exists());
        assert!(config.logs_dir().exists());
    }
}
