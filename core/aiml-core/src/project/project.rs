use super::dataset::{Dataset, DatasetSource};
use super::experiment::{Experiment, ExperimentStatus};
use super::timestamp;
use crate::binary::{self, BinaryKind};
use crate::error::{AimlError, Result};
use crate::ids;
use crate::persist::{atomic_write, read_bytes};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_PROJECT_TYPE: &str = "General";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProjectStatus {
    #[default]
    Active,
    Archived,
}

fn default_type() -> String {
    DEFAULT_PROJECT_TYPE.to_string()
}

/// A named collection of experiments and datasets.
///
/// The `locked` flag is cooperative: while set, every structural mutation is
/// refused with [`AimlError::ProjectLocked`] naming the holder. Only `unlock`
/// itself gets through, and `force` bypasses the holder check.
///
/// Experiments and datasets are keyed by id and iterate in id order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default = "ids::project_id")]
    id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_type")]
    pub project_type: String,
    #[serde(
        rename = "created",
        default = "Utc::now",
        deserialize_with = "timestamp::deserialize"
    )]
    created_at: DateTime<Utc>,
    #[serde(
        rename = "modified",
        default = "Utc::now",
        deserialize_with = "timestamp::deserialize"
    )]
    modified_at: DateTime<Utc>,
    #[serde(default)]
    status: ProjectStatus,
    #[serde(default)]
    locked: bool,
    #[serde(default)]
    locked_by: Option<String>,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    locked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    experiments: BTreeMap<String, Experiment>,
    #[serde(skip)]
    datasets: BTreeMap<String, Dataset>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ids::project_id(),
            name: name.into(),
            description: String::new(),
            project_type: default_type(),
            created_at: now,
            modified_at: now,
            status: ProjectStatus::Active,
            locked: false,
            locked_by: None,
            locked_at: None,
            experiments: BTreeMap::new(),
            datasets: BTreeMap::new(),
            metadata: Map::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_type(mut self, project_type: impl Into<String>) -> Self {
        self.project_type = project_type.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> ProjectStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    fn touch(&mut self) {
        self.modified_at = Utc::now();
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Locking
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn lock_holder(&self) -> Option<&str> {
        self.locked_by.as_deref()
    }

    pub fn locked_at(&self) -> Option<DateTime<Utc>> {
        self.locked_at
    }

    pub fn lock(&mut self, user: &str) -> Result<()> {
        if self.locked {
            return Err(AimlError::AlreadyLocked {
                holder: self.holder_name(),
            });
        }
        let now = Utc::now();
        self.locked = true;
        self.locked_by = Some(user.to_string());
        self.locked_at = Some(now);
        self.modified_at = now;
        Ok(())
    }

    /// Clears the lock. Unlocking an unlocked project is a no-op.
    pub fn unlock(&mut self, user: &str, force: bool) -> Result<()> {
        if !self.locked {
            return Ok(());
        }
        if !force && self.locked_by.as_deref() != Some(user) {
            return Err(AimlError::NotLockHolder {
                holder: self.holder_name(),
                user: user.to_string(),
            });
        }
        self.locked = false;
        self.locked_by = None;
        self.locked_at = None;
        self.touch();
        Ok(())
    }

    fn holder_name(&self) -> String {
        self.locked_by.clone().unwrap_or_else(|| "unknown".to_string())
    }

    /// Runs `op` only while the project is unlocked.
    fn guarded<'a, T>(&'a mut self, op: impl FnOnce(&'a mut Self) -> T) -> Result<T> {
        if self.locked {
            return Err(AimlError::ProjectLocked {
                holder: self.holder_name(),
            });
        }
        Ok(op(self))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Guarded Mutations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Adds (or replaces) an experiment and returns its id.
    pub fn add_experiment(&mut self, experiment: Experiment) -> Result<String> {
        self.guarded(|p| {
            let id = experiment.id().to_string();
            p.experiments.insert(id.clone(), experiment);
            p.touch();
            id
        })
    }

    /// Removes an experiment. Returns whether it existed.
    pub fn remove_experiment(&mut self, experiment_id: &str) -> Result<bool> {
        self.guarded(|p| {
            let removed = p.experiments.remove(experiment_id).is_some();
            if removed {
                p.touch();
            }
            removed
        })
    }

    /// Adds (or replaces) a dataset and returns its id.
    pub fn add_dataset(&mut self, dataset: Dataset) -> Result<String> {
        self.guarded(|p| {
            let id = dataset.id().to_string();
            p.datasets.insert(id.clone(), dataset);
            p.touch();
            id
        })
    }

    /// Removes a dataset. Returns whether it existed.
    pub fn remove_dataset(&mut self, dataset_id: &str) -> Result<bool> {
        self.guarded(|p| {
            let removed = p.datasets.remove(dataset_id).is_some();
            if removed {
                p.touch();
            }
            removed
        })
    }

    pub fn archive(&mut self) -> Result<()> {
        self.guarded(|p| {
            p.status = ProjectStatus::Archived;
            p.touch();
        })
    }

    pub fn activate(&mut self) -> Result<()> {
        self.guarded(|p| {
            p.status = ProjectStatus::Active;
            p.touch();
        })
    }

    pub fn experiment_mut(&mut self, experiment_id: &str) -> Result<Option<&mut Experiment>> {
        self.guarded(|p| {
            if p.experiments.contains_key(experiment_id) {
                p.touch();
            }
            p.experiments.get_mut(experiment_id)
        })
    }

    pub fn dataset_mut(&mut self, dataset_id: &str) -> Result<Option<&mut Dataset>> {
        self.guarded(|p| {
            if p.datasets.contains_key(dataset_id) {
                p.touch();
            }
            p.datasets.get_mut(dataset_id)
        })
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Read Access
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn experiment(&self, experiment_id: &str) -> Option<&Experiment> {
        self.experiments.get(experiment_id)
    }

    pub fn dataset(&self, dataset_id: &str) -> Option<&Dataset> {
        self.datasets.get(dataset_id)
    }

    pub fn experiments(&self) -> impl Iterator<Item = &Experiment> {
        self.experiments.values()
    }

    pub fn datasets(&self) -> impl Iterator<Item = &Dataset> {
        self.datasets.values()
    }

    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    pub fn dataset_count(&self) -> usize {
        self.datasets.len()
    }

    pub fn find_dataset_by_name(&self, name: &str) -> Option<&Dataset> {
        self.datasets.values().find(|ds| ds.name == name)
    }

    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            project_type: self.project_type.clone(),
            status: self.status,
            created: self.created_at,
            modified: self.modified_at,
            locked: self.locked,
            locked_by: self.locked_by.clone(),
            num_experiments: self.experiments.len(),
            num_datasets: self.datasets.len(),
            experiments: self
                .experiments
                .values()
                .map(|exp| ExperimentDigest {
                    id: exp.id().to_string(),
                    name: exp.name.clone(),
                    exp_type: exp.exp_type.clone(),
                    status: exp.status(),
                })
                .collect(),
            datasets: self
                .datasets
                .values()
                .map(|ds| DatasetDigest {
                    id: ds.id().to_string(),
                    name: ds.name.clone(),
                    source: ds.source,
                    rows: ds.rows(),
                    columns: ds.columns(),
                })
                .collect(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Serialization
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn to_json(&self, include_data: bool) -> Result<Value> {
        let mut value =
            serde_json::to_value(self).map_err(|e| AimlError::json("serializing project", e))?;
        let datasets = self
            .datasets
            .iter()
            .map(|(id, ds)| Ok((id.clone(), ds.to_json(include_data)?)))
            .collect::<Result<Map<String, Value>>>()?;
        if let Value::Object(map) = &mut value {
            map.insert("datasets".to_string(), Value::Object(datasets));
        }
        Ok(value)
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        let mut project =
            Self::deserialize(value).map_err(|e| AimlError::json("parsing project", e))?;
        if let Some(Value::Object(datasets)) = value.get("datasets") {
            for record in datasets.values() {
                let dataset = Dataset::from_json(record)?;
                project.datasets.insert(dataset.id().to_string(), dataset);
            }
        }
        Ok(project)
    }

    pub fn export_json(&self, path: &Path, include_data: bool) -> Result<()> {
        let value = self.to_json(include_data)?;
        let contents = serde_json::to_string_pretty(&value)
            .map_err(|e| AimlError::json("serializing project", e))?;
        atomic_write(path, contents.as_bytes())
    }

    pub fn import_json(path: &Path) -> Result<Self> {
        let bytes = read_bytes(path)?;
        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| AimlError::json(format!("parsing {}", path.display()), e))?;
        Self::from_json(&value)
    }

    /// Binary export always carries every dataset payload.
    pub fn export_binary(&self, path: &Path) -> Result<()> {
        let bytes = binary::encode(BinaryKind::Project, &self.to_json(true)?)?;
        atomic_write(path, &bytes)
    }

    pub fn import_binary(path: &Path) -> Result<Self> {
        let bytes = read_bytes(path)?;
        let value: Value = binary::decode(BinaryKind::Project, &bytes)?;
        Self::from_json(&value)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Summaries
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentDigest {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub exp_type: String,
    pub status: ExperimentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDigest {
    pub id: String,
    pub name: String,
    pub source: DatasetSource,
    pub rows: usize,
    pub columns: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub project_type: String,
    pub status: ProjectStatus,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub locked: bool,
    pub locked_by: Option<String>,
    pub num_experiments: usize,
    pub num_datasets: usize,
    pub experiments: Vec<ExperimentDigest>,
    pub datasets: Vec<DatasetDigest>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Table;
    use serde_json::json;
    use tempfile::TempDir;

    fn dataset_with_rows(name: &str, n: i64) -> Dataset {
        let mut ds = Dataset::new(name, DatasetSource::File);
        let values = (0..n).map(Value::from).collect();
        ds.set_data(&Table::from_columns(vec![("v", values)]).unwrap());
        ds
    }

    fn assert_locked<T: std::fmt::Debug>(result: Result<T>) {
        match result {
            Err(AimlError::ProjectLocked { holder }) => assert_eq!(holder, "alice"),
            other => panic!("expected ProjectLocked, got {:?}", other),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Lock Tests
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_lock_blocks_every_guarded_mutation() {
        let mut project = Project::new("P");
        let exp_id = project.add_experiment(Experiment::new("e")).unwrap();
        let ds_id = project.add_dataset(dataset_with_rows("d", 2)).unwrap();
        project.lock("alice").unwrap();

        assert_locked(project.add_experiment(Experiment::new("x")));
        assert_locked(project.remove_experiment(&exp_id));
        assert_locked(project.add_dataset(Dataset::new("y", DatasetSource::Api)));
        assert_locked(project.remove_dataset(&ds_id));
        assert_locked(project.archive());
        assert_locked(project.activate());
        assert_locked(project.experiment_mut(&exp_id).map(|e| e.is_some()));
        assert_locked(project.dataset_mut(&ds_id).map(|d| d.is_some()));

        assert_eq!(project.experiment_count(), 1);
        assert_eq!(project.dataset_count(), 1);
    }

    #[test]
    fn test_double_lock_names_holder() {
        let mut project = Project::new("P");
        project.lock("alice").unwrap();
        let err = project.lock("bob").unwrap_err();
        assert!(matches!(err, AimlError::AlreadyLocked { ref holder } if holder == "alice"));
    }

    #[test]
    fn test_unlock_requires_holder_unless_forced() {
        let mut project = Project::new("P");
        project.lock("alice").unwrap();

        let err = project.unlock("bob", false).unwrap_err();
        assert!(matches!(err, AimlError::NotLockHolder { .. }));
        assert!(project.is_locked());

        project.unlock("bob", true).unwrap();
        assert!(!project.is_locked());
        assert!(project.lock_holder().is_none());
        assert!(project.locked_at().is_none());
    }

    #[test]
    fn test_unlock_when_unlocked_is_noop() {
        let mut project = Project::new("P");
        assert!(project.unlock("anyone", false).is_ok());
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Mutation Tests
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_archive_and_activate() {
        let mut project = Project::new("P");
        project.archive().unwrap();
        assert_eq!(project.status(), ProjectStatus::Archived);
        project.activate().unwrap();
        assert_eq!(project.status(), ProjectStatus::Active);
    }

    #[test]
    fn test_remove_unknown_ids_report_false() {
        let mut project = Project::new("P");
        assert!(!project.remove_experiment("exp-none").unwrap());
        assert!(!project.remove_dataset("ds-none").unwrap());
    }

    #[test]
    fn test_experiment_mut_edits_in_place() {
        let mut project = Project::new("P");
        let id = project.add_experiment(Experiment::new("e")).unwrap();
        project
            .experiment_mut(&id)
            .unwrap()
            .unwrap()
            .update_status("Running")
            .unwrap();
        assert_eq!(
            project.experiment(&id).unwrap().status(),
            ExperimentStatus::Running
        );
    }

    #[test]
    fn test_mut_lookup_of_unknown_id_keeps_modified_time() {
        let mut project = Project::new("P");
        let before = project.modified_at();
        assert!(project.experiment_mut("exp-none").unwrap().is_none());
        assert!(project.dataset_mut("ds-none").unwrap().is_none());
        assert_eq!(project.modified_at(), before);
    }

    #[test]
    fn test_summary_counts() {
        let mut project = Project::new("P").with_type("Classification");
        project.add_experiment(Experiment::new("e")).unwrap();
        project.add_dataset(dataset_with_rows("d", 4)).unwrap();
        let summary = project.summary();
        assert_eq!(summary.num_experiments, 1);
        assert_eq!(summary.num_datasets, 1);
        assert_eq!(summary.datasets[0].rows, 4);
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["type"], json!("Classification"));
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Serialization Tests
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_json_layout() {
        let mut project = Project::new("P");
        project.add_dataset(dataset_with_rows("d", 3)).unwrap();
        let value = project.to_json(false).unwrap();
        for key in [
            "id", "name", "description", "project_type", "created", "modified", "status",
            "locked", "locked_by", "locked_at", "experiments", "datasets", "metadata",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["status"], json!("Active"));
        let ds = value["datasets"].as_object().unwrap().values().next().unwrap();
        assert!(ds.get("data").is_none());
    }

    #[test]
    fn test_roundtrip_with_data_restores_everything() {
        let mut project = Project::new("Churn").with_description("q3 churn");
        project.add_experiment(Experiment::new("baseline")).unwrap();
        project.add_dataset(dataset_with_rows("d", 5)).unwrap();
        project.lock("alice").unwrap();

        let restored = Project::from_json(&project.to_json(true).unwrap()).unwrap();
        assert_eq!(restored, project);
        assert_eq!(restored.lock_holder(), Some("alice"));
    }

    #[test]
    fn test_roundtrip_without_data_keeps_counts() {
        let mut project = Project::new("P");
        project.add_dataset(dataset_with_rows("d", 5)).unwrap();
        let restored = Project::from_json(&project.to_json(false).unwrap()).unwrap();
        let ds = restored.find_dataset_by_name("d").unwrap();
        assert_eq!(ds.rows(), 5);
        assert!(!ds.has_data());
    }

    #[test]
    fn test_export_import_files() {
        let temp = TempDir::new().unwrap();
        let mut project = Project::new("P");
        project.add_dataset(dataset_with_rows("d", 3)).unwrap();

        let json_path = temp.path().join("p.json");
        project.export_json(&json_path, true).unwrap();
        assert_eq!(Project::import_json(&json_path).unwrap(), project);

        let bin_path = temp.path().join("p.pkl");
        project.export_binary(&bin_path).unwrap();
        let restored = Project::import_binary(&bin_path).unwrap();
        assert!(restored.find_dataset_by_name("d").unwrap().has_data());
    }

    #[test]
    fn test_import_binary_rejects_json_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("p.json");
        Project::new("P").export_json(&path, false).unwrap();
        assert!(matches!(
            Project::import_binary(&path),
            Err(AimlError::CorruptBinary(_))
        ));
    }
}
