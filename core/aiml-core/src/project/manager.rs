//! Registry of projects with an active selection and on-disk persistence.
//!
//! Persistence is one pretty-printed JSON file per project in the storage
//! directory, named by [`StorageConfig::project_file_name`]. Loading is
//! tolerant: files that fail to parse are skipped with a warning.

use super::project::{Project, ProjectSummary};
use crate::error::{AimlError, Result};
use crate::storage::StorageConfig;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use walkdir::WalkDir;

/// On-disk project format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectFormat {
    /// Human-readable; payloads only with `include_data`.
    Json,
    /// Binary envelope; always complete.
    Binary,
}

impl FromStr for ProjectFormat {
    type Err = AimlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ProjectFormat::Json),
            "pickle" | "binary" => Ok(ProjectFormat::Binary),
            _ => Err(AimlError::InvalidProjectFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ProjectFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectFormat::Json => f.write_str("json"),
            ProjectFormat::Binary => f.write_str("binary"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProjectManager {
    projects: BTreeMap<String, Project>,
    active_project_id: Option<String>,
    storage_dir: PathBuf,
}

impl ProjectManager {
    pub fn new(storage_dir: PathBuf) -> Self {
        Self {
            projects: BTreeMap::new(),
            active_project_id: None,
            storage_dir,
        }
    }

    pub fn with_storage(storage: &StorageConfig) -> Self {
        Self::new(storage.projects_dir())
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Registry
    // ─────────────────────────────────────────────────────────────────────────────

    /// Creates, registers and returns a new project.
    pub fn create_project(
        &mut self,
        name: &str,
        description: &str,
        project_type: &str,
    ) -> &mut Project {
        let project = Project::new(name)
            .with_description(description)
            .with_type(project_type);
        let id = project.id().to_string();
        tracing::debug!(project_id = %id, name, "Created project");
        self.projects.entry(id).or_insert(project)
    }

    /// Registers a project, replacing any project with the same id.
    pub fn add_project(&mut self, project: Project) {
        self.projects.insert(project.id().to_string(), project);
    }

    /// Removes a project; unknown ids are ignored. Clears the active selection
    /// if it pointed at the removed project.
    pub fn remove_project(&mut self, project_id: &str) -> Option<Project> {
        let removed = self.projects.remove(project_id);
        if removed.is_some() && self.active_project_id.as_deref() == Some(project_id) {
            self.active_project_id = None;
        }
        removed
    }

    /// Looks up a project by id, or the active project when `project_id` is `None`.
    pub fn get_project(&self, project_id: Option<&str>) -> Option<&Project> {
        let id = project_id.or(self.active_project_id.as_deref())?;
        self.projects.get(id)
    }

    pub fn get_project_mut(&mut self, project_id: Option<&str>) -> Option<&mut Project> {
        let id = project_id
            .map(str::to_string)
            .or_else(|| self.active_project_id.clone())?;
        self.projects.get_mut(&id)
    }

    pub fn list_projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Active Selection
    // ─────────────────────────────────────────────────────────────────────────────

    /// Selects the active project. Unknown ids fail and leave the selection unchanged.
    pub fn set_active_project(&mut self, project_id: &str) -> Result<()> {
        if !self.projects.contains_key(project_id) {
            return Err(AimlError::ProjectNotFound(project_id.to_string()));
        }
        self.active_project_id = Some(project_id.to_string());
        Ok(())
    }

    pub fn active_project(&self) -> Option<&Project> {
        self.get_project(None)
    }

    pub fn active_project_mut(&mut self) -> Option<&mut Project> {
        self.get_project_mut(None)
    }

    pub fn active_project_id(&self) -> Option<&str> {
        self.active_project_id.as_deref()
    }

    pub fn project_summary(&self, project_id: &str) -> Option<ProjectSummary> {
        self.projects.get(project_id).map(Project::summary)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Import / Export
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn export_project(
        &self,
        project_id: &str,
        path: &Path,
        format: ProjectFormat,
        include_data: bool,
    ) -> Result<()> {
        let project = self
            .projects
            .get(project_id)
            .ok_or_else(|| AimlError::ProjectNotFound(project_id.to_string()))?;
        match format {
            ProjectFormat::Json => project.export_json(path, include_data),
            ProjectFormat::Binary => project.export_binary(path),
        }
    }

    /// Reads a project file, registers it and optionally makes it active.
    pub fn import_project(
        &mut self,
        path: &Path,
        format: ProjectFormat,
        set_active: bool,
    ) -> Result<&Project> {
        let project = match format {
            ProjectFormat::Json => Project::import_json(path)?,
            ProjectFormat::Binary => Project::import_binary(path)?,
        };
        let id = project.id().to_string();
        self.add_project(project);
        if set_active {
            self.set_active_project(&id)?;
        }
        self.projects
            .get(&id)
            .ok_or(AimlError::ProjectNotFound(id))
    }

    /// Writes every project, payloads included, into `directory` (default:
    /// the storage directory). Returns the number of files written.
    pub fn save_all_projects(&self, directory: Option<&Path>) -> Result<usize> {
        let dir = directory.unwrap_or(&self.storage_dir);
        fs_err::create_dir_all(dir).map_err(|e| AimlError::io("creating projects directory", e))?;

        for project in self.projects.values() {
            let path = dir.join(StorageConfig::project_file_name(project.id(), &project.name));
            project.export_json(&path, true)?;
        }
        tracing::info!(count = self.projects.len(), dir = %dir.display(), "Saved projects");
        Ok(self.projects.len())
    }

    /// Loads every `*.json` project in `directory` (default: the storage
    /// directory). A missing directory loads nothing. Returns the number loaded.
    pub fn load_all_projects(&mut self, directory: Option<&Path>) -> Result<usize> {
        let dir = directory.map_or_else(|| self.storage_dir.clone(), Path::to_path_buf);
        if !dir.exists() {
            return Ok(0);
        }

        let mut loaded = 0;
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
        {
            match Project::import_json(entry.path()) {
                Ok(project) => {
                    self.add_project(project);
                    loaded += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        path = %entry.path().display(),
                        "Skipping unreadable project file"
                    );
                }
            }
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{Dataset, DatasetSource, Experiment};
    use crate::table::Table;
    use serde_json::json;
    use tempfile::TempDir;

    fn manager(temp: &TempDir) -> ProjectManager {
        ProjectManager::new(temp.path().join("projects"))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Registry Tests
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_create_and_get() {
        let temp = TempDir::new().unwrap();
        let mut pm = manager(&temp);
        let id = pm.create_project("Churn", "desc", "Classification").id().to_string();
        let project = pm.get_project(Some(&id)).unwrap();
        assert_eq!(project.name, "Churn");
        assert_eq!(project.project_type, "Classification");
        assert!(pm.get_project(None).is_none());
    }

    #[test]
    fn test_set_active_unknown_fails_and_keeps_selection() {
        let temp = TempDir::new().unwrap();
        let mut pm = manager(&temp);
        let id = pm.create_project("A", "", "General").id().to_string();
        pm.set_active_project(&id).unwrap();

        let err = pm.set_active_project("proj-missing").unwrap_err();
        assert!(matches!(err, AimlError::ProjectNotFound(_)));
        assert_eq!(pm.active_project_id(), Some(id.as_str()));
    }

    #[test]
    fn test_remove_active_clears_selection() {
        let temp = TempDir::new().unwrap();
        let mut pm = manager(&temp);
        let id = pm.create_project("A", "", "General").id().to_string();
        pm.set_active_project(&id).unwrap();

        assert!(pm.remove_project(&id).is_some());
        assert!(pm.active_project().is_none());
        assert!(pm.remove_project(&id).is_none());
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("json".parse::<ProjectFormat>().unwrap(), ProjectFormat::Json);
        assert_eq!("pickle".parse::<ProjectFormat>().unwrap(), ProjectFormat::Binary);
        assert!(matches!(
            "xml".parse::<ProjectFormat>(),
            Err(AimlError::InvalidProjectFormat(_))
        ));
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Persistence Tests
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_save_all_uses_id_and_name_in_file_names() {
        let temp = TempDir::new().unwrap();
        let mut pm = manager(&temp);
        let id = pm.create_project("Churn Model", "", "General").id().to_string();

        assert_eq!(pm.save_all_projects(None).unwrap(), 1);
        assert!(pm
            .storage_dir()
            .join(format!("{}_Churn_Model.json", id))
            .exists());
    }

    #[test]
    fn test_save_then_load_restores_projects_with_data() {
        let temp = TempDir::new().unwrap();
        let mut pm = manager(&temp);
        let project = pm.create_project("P", "", "General");
        let mut ds = Dataset::new("d", DatasetSource::File);
        ds.set_data(&Table::from_columns(vec![("a", vec![json!(1), json!(2)])]).unwrap());
        project.add_dataset(ds).unwrap();
        project.add_experiment(Experiment::new("e")).unwrap();
        let id = project.id().to_string();
        pm.save_all_projects(None).unwrap();

        let mut fresh = manager(&temp);
        assert_eq!(fresh.load_all_projects(None).unwrap(), 1);
        let restored = fresh.get_project(Some(&id)).unwrap();
        assert_eq!(restored.experiment_count(), 1);
        assert!(restored.find_dataset_by_name("d").unwrap().has_data());
    }

    #[test]
    fn test_load_skips_unparseable_files() {
        let temp = TempDir::new().unwrap();
        let mut pm = manager(&temp);
        pm.create_project("Good", "", "General");
        pm.save_all_projects(None).unwrap();
        std::fs::write(pm.storage_dir().join("broken.json"), "{not json").unwrap();
        std::fs::write(pm.storage_dir().join("notes.txt"), "ignored").unwrap();

        let mut fresh = manager(&temp);
        assert_eq!(fresh.load_all_projects(None).unwrap(), 1);
        assert_eq!(fresh.len(), 1);
    }

    #[test]
    fn test_load_missing_directory_is_empty() {
        let temp = TempDir::new().unwrap();
        let mut pm = manager(&temp);
        assert_eq!(pm.load_all_projects(None).unwrap(), 0);
    }

    #[test]
    fn test_export_import_binary_sets_active() {
        let temp = TempDir::new().unwrap();
        let mut pm = manager(&temp);
        let id = pm.create_project("P", "", "General").id().to_string();
        let path = temp.path().join("p.pkl");
        pm.export_project(&id, &path, ProjectFormat::Binary, false).unwrap();

        let mut other = manager(&temp);
        let imported = other.import_project(&path, ProjectFormat::Binary, true).unwrap();
        assert_eq!(imported.id(), id);
        assert_eq!(other.active_project_id(), Some(id.as_str()));
    }

    #[test]
    fn test_export_unknown_project_fails() {
        let temp = TempDir::new().unwrap();
        let pm = manager(&temp);
        let err = pm
            .export_project("proj-x", &temp.path().join("x.json"), ProjectFormat::Json, true)
            .unwrap_err();
        assert!(matches!(err, AimlError::ProjectNotFound(_)));
    }
}
