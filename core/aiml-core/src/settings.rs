//! Application settings: a flat key/value map seeded from a fixed schema.
//!
//! Unknown keys are accepted and kept. Files are JSON unless the path ends in
//! `.yaml` or `.yml`.

use crate::error::{AimlError, Result};
use crate::persist;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Settings map with no implicit defaults applied on lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    values: BTreeMap<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            values: default_values(),
        }
    }
}

fn default_values() -> BTreeMap<String, Value> {
    [
        // Display
        ("theme", json!("light")),
        ("page_size", json!(10)),
        ("max_rows_display", json!(1000)),
        ("precision", json!(2)),
        ("show_index", json!(true)),
        // Data
        ("auto_save", json!(false)),
        ("auto_save_interval", json!(300)),
        ("max_memory_mb", json!(1024)),
        ("cache_enabled", json!(true)),
        // Analysis
        ("confidence_level", json!(0.95)),
        ("random_seed", json!(42)),
        ("n_jobs", json!(-1)),
        // Export
        ("default_export_format", json!("csv")),
        ("include_index_export", json!(false)),
        // UI
        ("show_code", json!(true)),
        ("show_tooltips", json!(true)),
        ("animation_enabled", json!(true)),
        // Advanced
        ("debug_mode", json!(false)),
        ("log_actions", json!(true)),
        ("session_timeout", json!(3600)),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Json,
    Yaml,
}

impl FileFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                FileFormat::Yaml
            }
            _ => FileFormat::Json,
        }
    }
}

impl Settings {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.values.get(key).cloned().unwrap_or(default)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Merges `values` over the current settings.
    pub fn update(&mut self, values: Map<String, Value>) {
        self.values.extend(values);
    }

    /// Restores the default schema, dropping any extra keys.
    pub fn reset(&mut self) {
        self.values = default_values();
    }

    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn to_map(&self) -> Map<String, Value> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub(crate) fn replace(&mut self, values: Map<String, Value>) {
        self.values = values.into_iter().collect();
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Typed Accessors
    // ─────────────────────────────────────────────────────────────────────────────

    fn flag(&self, key: &str, default: bool) -> bool {
        self.values
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    pub fn log_actions(&self) -> bool {
        self.flag("log_actions", true)
    }

    pub fn cache_enabled(&self) -> bool {
        self.flag("cache_enabled", true)
    }

    pub fn session_timeout_secs(&self) -> u64 {
        self.values
            .get("session_timeout")
            .and_then(Value::as_u64)
            .unwrap_or(3600)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Files
    // ─────────────────────────────────────────────────────────────────────────────

    /// Writes every setting to `path` as JSON or YAML.
    pub fn export_to(&self, path: &Path) -> Result<()> {
        let content = match FileFormat::for_path(path) {
            FileFormat::Json => serde_json::to_string_pretty(&self.values)
                .map_err(|e| AimlError::json("serializing settings", e))?,
            FileFormat::Yaml => {
                serde_yaml::to_string(&self.values).map_err(|e| AimlError::Yaml {
                    context: "serializing settings".to_string(),
                    source: e,
                })?
            }
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs_err::create_dir_all(parent)
                .map_err(|e| AimlError::io("creating settings directory", e))?;
        }
        persist::atomic_write(path, content.as_bytes())
    }

    /// Merges the settings stored at `path` over the current ones.
    /// Returns the number of keys read.
    pub fn import_from(&mut self, path: &Path) -> Result<usize> {
        let bytes = persist::read_bytes(path)?;
        let values: Map<String, Value> = match FileFormat::for_path(path) {
            FileFormat::Json => serde_json::from_slice(&bytes)
                .map_err(|e| AimlError::json(format!("parsing {}", path.display()), e))?,
            FileFormat::Yaml => serde_yaml::from_slice(&bytes).map_err(|e| AimlError::Yaml {
                context: format!("parsing {}", path.display()),
                source: e,
            })?,
        };
        let count = values.len();
        self.update(values);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_cover_schema() {
        let settings = Settings::default();
        assert_eq!(settings.as_map().len(), 20);
        assert_eq!(settings.get("theme"), Some(&json!("light")));
        assert_eq!(settings.get("n_jobs"), Some(&json!(-1)));
        assert!(settings.log_actions());
        assert!(settings.cache_enabled());
        assert_eq!(settings.session_timeout_secs(), 3600);
    }

    #[test]
    fn test_get_or_missing_key() {
        let settings = Settings::default();
        assert_eq!(settings.get_or("missing", json!("fallback")), json!("fallback"));
        assert!(settings.get("missing").is_none());
    }

    #[test]
    fn test_update_and_reset() {
        let mut settings = Settings::default();
        let mut changes = Map::new();
        changes.insert("theme".to_string(), json!("dark"));
        changes.insert("custom".to_string(), json!(1));
        settings.update(changes);
        assert_eq!(settings.get("theme"), Some(&json!("dark")));
        assert_eq!(settings.get("custom"), Some(&json!(1)));

        settings.reset();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_typed_accessors_follow_overrides() {
        let mut settings = Settings::default();
        settings.set("log_actions", json!(false));
        settings.set("session_timeout", json!(60));
        assert!(!settings.log_actions());
        assert_eq!(settings.session_timeout_secs(), 60);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // File Tests
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_json_export_then_import_merges() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");

        let mut source = Settings::default();
        source.set("theme", json!("dark"));
        source.export_to(&path).unwrap();

        let mut target = Settings::default();
        target.set("extra", json!("kept"));
        assert_eq!(target.import_from(&path).unwrap(), 20);
        assert_eq!(target.get("theme"), Some(&json!("dark")));
        assert_eq!(target.get("extra"), Some(&json!("kept")));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("settings.yaml");

        let mut source = Settings::default();
        source.set("precision", json!(4));
        source.export_to(&path).unwrap();
        assert!(fs_err::read_to_string(&path).unwrap().contains("precision: 4"));

        let mut target = Settings::default();
        target.import_from(&path).unwrap();
        assert_eq!(target.get("precision"), Some(&json!(4)));
        assert_eq!(target.get("confidence_level"), Some(&json!(0.95)));
    }

    #[test]
    fn test_import_missing_file_fails() {
        let temp = TempDir::new().unwrap();
        let mut settings = Settings::default();
        let err = settings.import_from(&temp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, AimlError::FileNotFound(_)));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_import_rejects_non_object() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        fs_err::write(&path, "[1, 2, 3]").unwrap();
        let mut settings = Settings::default();
        assert!(matches!(
            settings.import_from(&path),
            Err(AimlError::Json { .. })
        ));
    }
}
