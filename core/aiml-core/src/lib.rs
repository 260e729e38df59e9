//! # aiml-core
//!
//! Session, workspace and project state for AIML Dash. The UI callbacks hold
//! one [`AppManager`] and reach every registry through it.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Clients can wrap with async if needed.
//! - **Not thread-safe**: Clients provide their own synchronization (`Mutex`, `RwLock`).
//! - **Copy in, copy out**: Tables cross every registry boundary by value.
//! - **Explicit context**: No global registries; tests build their own `AppManager`.
//! - **Cooperative locking**: A locked project rejects mutations in-process only.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use aiml_core::{AppManager, StorageConfig};
//!
//! let mut app = AppManager::new(StorageConfig::default());
//! app.data_manager_mut().load_sample_data();
//! let (workspace, projects) = app.workspace_and_projects_mut();
//! workspace.create_project_from_datasets(projects, "Demo", None, "", "General")?;
//! ```

// Public modules
pub mod app;
pub mod binary;
pub mod cache;
pub mod error;
pub mod ids;
pub mod logging;
pub mod project;
pub mod samples;
pub mod session;
pub mod settings;
pub mod storage;
pub mod table;
pub mod workspace;

mod persist;

// Re-export commonly used items at crate root
pub use app::{
    ActionEntry, AppManager, AppSnapshot, ExportOptions, ImportOptions, StatusSummary,
    APP_STATE_VERSION,
};
pub use cache::{Cache, CacheEntry};
pub use error::{AimlError, Result};
pub use project::*;
pub use session::{HistoryEntry, Session};
pub use settings::Settings;
pub use storage::StorageConfig;
pub use table::{SplitFrame, Table, TablePayload};
pub use workspace::{
    ActiveProjectInfo, DataManager, DatasetInfo, DatasetMetadata, FilterOutcome, FilterStage,
    ProjectDatasetInfo, StageFailure, WorkspaceSnapshot, WORKSPACE_STATE_VERSION,
};
