//! Projects and the objects they own.
//!
//! A [`Project`] exclusively owns its [`Experiment`]s and [`Dataset`]s; nothing
//! is shared across projects. [`ProjectManager`] is the registry on top.

mod dataset;
mod experiment;
mod manager;
#[allow(clippy::module_inception)]
mod project;
mod timestamp;

pub use dataset::{Dataset, DatasetSource};
pub use experiment::{Experiment, ExperimentStatus, DEFAULT_EXPERIMENT_TYPE};
pub use manager::{ProjectFormat, ProjectManager};
pub use project::{
    DatasetDigest, ExperimentDigest, Project, ProjectStatus, ProjectSummary, DEFAULT_PROJECT_TYPE,
};
