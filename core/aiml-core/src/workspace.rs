//! The workspace: named in-memory tables the UI works on.
//!
//! [`DataManager`] keeps one entry per dataset name. Each entry bundles the
//! table with its metadata, description and load command, so a table can
//! never exist without metadata, and the active name always refers to a
//! stored entry.
//!
//! Tables are copied on the way in and on the way out; callers never hold an
//! alias into the workspace.
//!
//! The project bridge methods move tables between the workspace and a
//! [`ProjectManager`]. They return `Ok(message)` or an error whose text is
//! ready to show to the user.

use crate::error::{AimlError, Result};
use crate::project::{Dataset, DatasetSource, ProjectManager};
use crate::samples;
use crate::table::{io, Table, TablePayload};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Snapshot version written by [`DataManager::export_all_state`].
pub const WORKSPACE_STATE_VERSION: &str = "2.0";

/// Snapshots are accepted when their version starts with this prefix.
const COMPATIBLE_VERSION_PREFIX: &str = "2.";

static NON_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("valid identifier regex"));

// ═══════════════════════════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub rows: usize,
    pub columns: usize,
    pub added: DateTime<Utc>,
    #[serde(rename = "memory_usage")]
    pub memory_usage_mb: f64,
}

impl DatasetMetadata {
    fn describe(table: &Table) -> Self {
        Self {
            rows: table.n_rows(),
            columns: table.n_columns(),
            added: Utc::now(),
            memory_usage_mb: table.memory_usage_bytes() as f64 / (1024.0 * 1024.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct WorkspaceEntry {
    table: Table,
    metadata: DatasetMetadata,
    description: String,
    load_command: String,
}

/// Everything the UI shows about one workspace dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetInfo {
    pub name: String,
    pub rows: usize,
    pub columns: usize,
    pub column_names: Vec<String>,
    pub column_types: BTreeMap<String, String>,
    pub description: String,
    pub load_command: String,
    pub metadata: DatasetMetadata,
}

/// Pipeline stage of [`DataManager::apply_filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStage {
    Filter,
    Sort,
    Rows,
}

impl fmt::Display for FilterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FilterStage::Filter => "filter",
            FilterStage::Sort => "sort",
            FilterStage::Rows => "rows",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageFailure {
    pub stage: FilterStage,
    pub message: String,
}

/// Result of [`DataManager::apply_filter`]: the table as transformed by every
/// stage that succeeded, and the stage that stopped the pipeline, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    pub table: Table,
    pub failure: Option<StageFailure>,
}

fn legacy_version() -> String {
    "1.0".to_string()
}

/// Serialized workspace, in the parallel-map layout used on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceSnapshot {
    #[serde(default = "legacy_version")]
    pub version: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub active_dataset: Option<String>,
    #[serde(default)]
    pub datasets: BTreeMap<String, TablePayload>,
    #[serde(default)]
    pub metadata: BTreeMap<String, DatasetMetadata>,
    #[serde(default)]
    pub descriptions: BTreeMap<String, String>,
    #[serde(default)]
    pub load_commands: BTreeMap<String, String>,
}

/// A project dataset as listed by [`DataManager::project_datasets`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectDatasetInfo {
    pub id: String,
    pub name: String,
    pub source: DatasetSource,
    pub description: String,
    pub rows: usize,
    pub columns: usize,
    pub size: String,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveProjectInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub project_type: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub is_locked: bool,
    pub locked_by: Option<String>,
    pub num_experiments: usize,
    pub num_datasets: usize,
}

// ═══════════════════════════════════════════════════════════════════════════════
// DataManager
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct DataManager {
    entries: BTreeMap<String, WorkspaceEntry>,
    active_dataset: Option<String>,
}

impl DataManager {
    /// Creates an empty workspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a workspace preloaded with the demo datasets.
    pub fn with_sample_data() -> Self {
        let mut manager = Self::new();
        manager.load_sample_data();
        manager
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Registry
    // ─────────────────────────────────────────────────────────────────────────────

    /// Inserts or overwrites a dataset. The table is copied in.
    pub fn add_dataset(&mut self, name: &str, table: &Table, description: &str, load_command: &str) {
        self.entries.insert(
            name.to_string(),
            WorkspaceEntry {
                metadata: DatasetMetadata::describe(table),
                table: table.clone(),
                description: description.to_string(),
                load_command: load_command.to_string(),
            },
        );
        tracing::debug!(dataset = name, rows = table.n_rows(), "Added dataset to workspace");
    }

    /// A copy of the named dataset, or of the active one when `name` is `None`.
    pub fn get_dataset(&self, name: Option<&str>) -> Option<Table> {
        self.entry(name).map(|(_, entry)| entry.table.clone())
    }

    fn entry(&self, name: Option<&str>) -> Option<(&str, &WorkspaceEntry)> {
        let name = name.or(self.active_dataset.as_deref())?;
        self.entries
            .get_key_value(name)
            .map(|(key, entry)| (key.as_str(), entry))
    }

    /// Dataset names in key order.
    pub fn dataset_names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes a dataset; unknown names are ignored. If it was active, the
    /// first remaining name (lexicographic) becomes active.
    pub fn remove_dataset(&mut self, name: &str) {
        if self.entries.remove(name).is_none() {
            return;
        }
        if self.active_dataset.as_deref() == Some(name) {
            self.active_dataset = self.entries.keys().next().cloned();
        }
    }

    /// Selects the active dataset. Unknown names leave the selection unchanged
    /// and return `false`.
    pub fn set_active_dataset(&mut self, name: &str) -> bool {
        if !self.entries.contains_key(name) {
            tracing::debug!(dataset = name, "Ignoring unknown active dataset");
            return false;
        }
        self.active_dataset = Some(name.to_string());
        true
    }

    pub fn active_dataset_name(&self) -> Option<&str> {
        self.active_dataset.as_deref()
    }

    pub fn dataset_info(&self, name: Option<&str>) -> Option<DatasetInfo> {
        let (name, entry) = self.entry(name)?;
        Some(DatasetInfo {
            name: name.to_string(),
            rows: entry.table.n_rows(),
            columns: entry.table.n_columns(),
            column_names: entry.table.column_names().to_vec(),
            column_types: entry.table.dtypes(),
            description: entry.description.clone(),
            load_command: entry.load_command.clone(),
            metadata: entry.metadata.clone(),
        })
    }

    /// Loads the seeded `diamonds` and `titanic` tables and activates `diamonds`.
    pub fn load_sample_data(&mut self) {
        self.add_dataset(
            "diamonds",
            &samples::diamonds(),
            "Diamond characteristics and prices",
            "# Sample diamonds dataset\ndiamonds = read_csv(\"diamonds.csv\")",
        );
        self.add_dataset(
            "titanic",
            &samples::titanic(),
            "Titanic passenger survival data",
            "# Sample titanic dataset\ntitanic = read_csv(\"titanic.csv\")",
        );
        self.active_dataset = Some("diamonds".to_string());
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Filtering
    // ─────────────────────────────────────────────────────────────────────────────

    /// Runs filter, then sort, then row selection on a copy of the dataset.
    ///
    /// Each stage is skipped when its input is empty. A failing stage stops the
    /// pipeline; the outcome carries the table as it stood before that stage.
    /// Returns `None` only when the dataset does not exist.
    pub fn apply_filter(
        &self,
        name: Option<&str>,
        filter: Option<&str>,
        sort_by: &[String],
        ascending: Option<&[bool]>,
        rows: Option<&str>,
    ) -> Option<FilterOutcome> {
        let mut table = self.get_dataset(name)?;

        let stopped = |table: Table, stage: FilterStage, err: AimlError| {
            tracing::warn!(error = %err, %stage, "Filter pipeline stopped");
            Some(FilterOutcome {
                table,
                failure: Some(StageFailure {
                    stage,
                    message: err.to_string(),
                }),
            })
        };

        if let Some(expr) = filter.filter(|e| !e.trim().is_empty()) {
            match table.query(expr) {
                Ok(filtered) => table = filtered,
                Err(err) => return stopped(table, FilterStage::Filter, err),
            }
        }

        if !sort_by.is_empty() {
            let mut order = ascending.unwrap_or_default().to_vec();
            order.resize(sort_by.len(), true);
            match table.sort_by(sort_by, &order) {
                Ok(sorted) => table = sorted,
                Err(err) => return stopped(table, FilterStage::Sort, err),
            }
        }

        if let Some(selection) = rows.filter(|r| !r.trim().is_empty()) {
            match table.select_rows(selection) {
                Ok(selected) => table = selected,
                Err(err) => return stopped(table, FilterStage::Rows, err),
            }
        }

        Some(FilterOutcome {
            table,
            failure: None,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // File Upload & Export
    // ─────────────────────────────────────────────────────────────────────────────

    /// Loads an uploaded file.
    ///
    /// `contents` is a data URL (`data:<mime>;base64,<payload>`) or bare
    /// base64. The dataset is named after the file stem, suffixed `_1`, `_2`,
    /// ... on collision, and becomes active.
    pub fn load_from_file(&mut self, contents: &str, filename: &str) -> Result<String> {
        let payload = contents
            .split_once(',')
            .map_or(contents, |(_, payload)| payload);
        let bytes = BASE64
            .decode(payload.trim())
            .map_err(|e| AimlError::Base64 {
                context: format!("decoding upload {}", filename),
                source: e,
            })?;

        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        let (table, reader, label) = match extension.as_str() {
            "csv" => (io::read_csv(&bytes)?, "read_csv", "CSV"),
            "json" => (io::read_json(&bytes)?, "read_json", "JSON"),
            "pkl" => (io::read_binary(&bytes)?, "read_binary", "binary table"),
            "xls" | "xlsx" => {
                return Err(AimlError::UnsupportedFormat(format!(
                    "Excel upload {} (save it as CSV instead)",
                    filename
                )))
            }
            _ => return Err(AimlError::UnsupportedFileType(filename.to_string())),
        };

        let stem = filename
            .rsplit_once('.')
            .map_or(filename, |(stem, _)| stem);
        let name = self.unique_name(stem);
        let identifier = NON_IDENTIFIER.replace_all(&name, "_");
        let load_command = format!(
            "# Load data from {}\n{} = {}(\"{}\")",
            label, identifier, reader, filename
        );

        self.add_dataset(
            &name,
            &table,
            &format!("Loaded from {}", filename),
            &load_command,
        );
        self.active_dataset = Some(name.clone());

        tracing::info!(file = filename, dataset = %name, rows = table.n_rows(), "Loaded upload");
        Ok(format!(
            "Successfully loaded {} as '{}' ({} rows, {} columns)",
            filename,
            name,
            table.n_rows(),
            table.n_columns()
        ))
    }

    fn unique_name(&self, base: &str) -> String {
        if !self.contains(base) {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{}_{}", base, n))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    /// Renders a dataset as `csv`, `json` (records) or `binary` (base64 of the
    /// binary table envelope). Unknown formats, including `excel`, and missing
    /// datasets yield `None`.
    pub fn export_dataset(&self, name: Option<&str>, format: &str) -> Option<String> {
        let table = self.get_dataset(name)?;
        let rendered = match format {
            "csv" => io::write_csv(&table),
            "json" => io::write_json_records(&table),
            "binary" => io::write_binary(&table).map(|bytes| BASE64.encode(bytes)),
            other => Err(AimlError::UnsupportedFormat(other.to_string())),
        };
        rendered
            .map_err(|err| tracing::warn!(error = %err, format, "Dataset export failed"))
            .ok()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Snapshot
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn export_all_state(&self) -> WorkspaceSnapshot {
        let mut snapshot = WorkspaceSnapshot {
            version: WORKSPACE_STATE_VERSION.to_string(),
            timestamp: Utc::now(),
            active_dataset: self.active_dataset.clone(),
            datasets: BTreeMap::new(),
            metadata: BTreeMap::new(),
            descriptions: BTreeMap::new(),
            load_commands: BTreeMap::new(),
        };
        for (name, entry) in &self.entries {
            snapshot.datasets.insert(name.clone(), entry.table.to_payload());
            snapshot.metadata.insert(name.clone(), entry.metadata.clone());
            snapshot
                .descriptions
                .insert(name.clone(), entry.description.clone());
            snapshot
                .load_commands
                .insert(name.clone(), entry.load_command.clone());
        }
        snapshot
    }

    /// Replaces the workspace with a snapshot.
    ///
    /// Requires a `2.x` version. Datasets that fail to rebuild are skipped
    /// with a warning. The active dataset is the snapshot's when it was
    /// restored, otherwise the first restored name.
    pub fn import_all_state(&mut self, snapshot: &WorkspaceSnapshot) -> Result<String> {
        if !snapshot.version.starts_with(COMPATIBLE_VERSION_PREFIX) {
            return Err(AimlError::IncompatibleVersion {
                found: snapshot.version.clone(),
                expected: format!("{}x", COMPATIBLE_VERSION_PREFIX),
            });
        }

        self.entries.clear();
        self.active_dataset = None;

        for (name, payload) in &snapshot.datasets {
            let table = match Table::from_payload(payload.clone()) {
                Ok(table) => table,
                Err(err) => {
                    tracing::warn!(error = %err, dataset = %name, "Could not restore dataset");
                    continue;
                }
            };
            let metadata = snapshot
                .metadata
                .get(name)
                .cloned()
                .unwrap_or_else(|| DatasetMetadata::describe(&table));
            self.entries.insert(
                name.clone(),
                WorkspaceEntry {
                    table,
                    metadata,
                    description: snapshot.descriptions.get(name).cloned().unwrap_or_default(),
                    load_command: snapshot.load_commands.get(name).cloned().unwrap_or_default(),
                },
            );
        }

        self.active_dataset = snapshot
            .active_dataset
            .clone()
            .filter(|name| self.entries.contains_key(name))
            .or_else(|| self.entries.keys().next().cloned());

        Ok(format!("Successfully imported {} dataset(s)", self.entries.len()))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Project Bridge
    // ─────────────────────────────────────────────────────────────────────────────

    fn workspace_dataset(&self, name: &str) -> Result<Dataset> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| AimlError::DatasetNotFound(name.to_string()))?;
        let mut dataset =
            Dataset::new(name, DatasetSource::DataManager).with_description(&entry.description);
        dataset.set_source_info(Map::from_iter([
            ("origin".to_string(), Value::from("DataManager")),
            ("load_command".to_string(), Value::from(entry.load_command.as_str())),
        ]));
        dataset.set_data(&entry.table);
        Ok(dataset)
    }

    /// Copies a workspace dataset into a project (the active one when
    /// `project_id` is `None`).
    pub fn add_dataset_to_project(
        &self,
        projects: &mut ProjectManager,
        dataset_name: &str,
        project_id: Option<&str>,
    ) -> Result<String> {
        let dataset = self.workspace_dataset(dataset_name)?;
        let project = projects
            .get_project_mut(project_id)
            .ok_or_else(|| missing_project(project_id))?;
        project.add_dataset(dataset)?;
        Ok(format!(
            "Dataset '{}' added to project '{}'",
            dataset_name, project.name
        ))
    }

    /// Copies a project dataset into the workspace under its own name or
    /// `rename`, and makes it active.
    pub fn load_dataset_from_project(
        &mut self,
        projects: &ProjectManager,
        dataset_id: &str,
        project_id: Option<&str>,
        rename: Option<&str>,
    ) -> Result<String> {
        let project = projects
            .get_project(project_id)
            .ok_or_else(|| missing_project(project_id))?;
        let dataset = project
            .dataset(dataset_id)
            .ok_or_else(|| AimlError::DatasetNotFound(format!("{} in project", dataset_id)))?;
        let table = dataset
            .data()
            .ok_or_else(|| AimlError::DatasetHasNoData(dataset.name.clone()))?;

        let name = rename.unwrap_or(&dataset.name);
        self.add_dataset(
            name,
            &table,
            &dataset.description,
            dataset.source_info_str("load_command"),
        );
        self.active_dataset = Some(name.to_string());
        Ok(format!(
            "Dataset '{}' loaded from project '{}'",
            name, project.name
        ))
    }

    /// Copies every dataset with data from the active project into the
    /// workspace. Sets an active dataset if none was selected.
    pub fn sync_with_active_project(&mut self, projects: &ProjectManager) -> Result<String> {
        let project = projects.active_project().ok_or(AimlError::NoActiveProject)?;

        let mut first_loaded = None;
        let mut count = 0;
        for dataset in project.datasets() {
            let Some(table) = dataset.data() else {
                continue;
            };
            self.add_dataset(
                &dataset.name,
                &table,
                &dataset.description,
                dataset.source_info_str("load_command"),
            );
            first_loaded.get_or_insert_with(|| dataset.name.clone());
            count += 1;
        }

        if self.active_dataset.is_none() {
            self.active_dataset = first_loaded;
        }
        Ok(format!(
            "Synchronized {} dataset(s) from project '{}'",
            count, project.name
        ))
    }

    /// Creates a project holding copies of the named datasets (all of them
    /// when `dataset_names` is `None`) and makes it active. Unknown names are
    /// skipped.
    pub fn create_project_from_datasets(
        &self,
        projects: &mut ProjectManager,
        project_name: &str,
        dataset_names: Option<&[String]>,
        description: &str,
        project_type: &str,
    ) -> Result<String> {
        let names = dataset_names.map_or_else(|| self.dataset_names(), <[String]>::to_vec);
        let datasets = names
            .iter()
            .filter(|name| self.contains(name))
            .map(|name| self.workspace_dataset(name))
            .collect::<Result<Vec<_>>>()?;

        let count = datasets.len();
        let project = projects.create_project(project_name, description, project_type);
        for dataset in datasets {
            project.add_dataset(dataset)?;
        }
        let id = project.id().to_string();
        projects.set_active_project(&id)?;

        Ok(format!(
            "Created project '{}' with {} dataset(s)",
            project_name, count
        ))
    }

    pub fn project_datasets(
        &self,
        projects: &ProjectManager,
        project_id: Option<&str>,
    ) -> Vec<ProjectDatasetInfo> {
        let Some(project) = projects.get_project(project_id) else {
            return Vec::new();
        };
        project
            .datasets()
            .map(|ds| ProjectDatasetInfo {
                id: ds.id().to_string(),
                name: ds.name.clone(),
                source: ds.source,
                description: ds.description.clone(),
                rows: ds.rows(),
                columns: ds.columns(),
                size: ds.size().to_string(),
                created: ds.created_at(),
            })
            .collect()
    }

    pub fn has_active_project(&self, projects: &ProjectManager) -> bool {
        projects.active_project().is_some()
    }

    pub fn active_project_info(&self, projects: &ProjectManager) -> Option<ActiveProjectInfo> {
        let project = projects.active_project()?;
        Some(ActiveProjectInfo {
            id: project.id().to_string(),
            name: project.name.clone(),
            description: project.description.clone(),
            project_type: project.project_type.clone(),
            created: project.created_at(),
            modified: project.modified_at(),
            is_locked: project.is_locked(),
            locked_by: project.lock_holder().map(str::to_string),
            num_experiments: project.experiment_count(),
            num_datasets: project.dataset_count(),
        })
    }
}

fn missing_project(project_id: Option<&str>) -> AimlError {
    match project_id {
        Some(id) => AimlError::ProjectNotFound(id.to_string()),
        None => AimlError::NoActiveProject,
    }
}
