use super::timestamp;
use crate::error::{AimlError, Result};
use crate::ids;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_EXPERIMENT_TYPE: &str = "General";

/// Lifecycle of an experiment.
///
/// The usual path is `Pending → Running → {Completed, Failed, Cancelled}`, but
/// transitions are not constrained: any status may be set from any other.
///
/// Parsing with [`FromStr`] is strict. Reading a project file is not: names
/// match case-insensitively and an unknown or missing status loads as
/// `Pending` with a warning, so one stale field does not drop the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ExperimentStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExperimentStatus {
    pub const ALL: [ExperimentStatus; 5] = [
        ExperimentStatus::Pending,
        ExperimentStatus::Running,
        ExperimentStatus::Completed,
        ExperimentStatus::Failed,
        ExperimentStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentStatus::Pending => "Pending",
            ExperimentStatus::Running => "Running",
            ExperimentStatus::Completed => "Completed",
            ExperimentStatus::Failed => "Failed",
            ExperimentStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExperimentStatus::Completed | ExperimentStatus::Failed | ExperimentStatus::Cancelled
        )
    }
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExperimentStatus {
    type Err = AimlError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AimlError::InvalidStatus(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for ExperimentStatus {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(ExperimentStatus::default());
        };
        let name = raw.trim();
        Ok(Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(name))
            .unwrap_or_else(|| {
                tracing::warn!(status = %raw, "Unknown experiment status, loading as Pending");
                ExperimentStatus::default()
            }))
    }
}

fn default_type() -> String {
    DEFAULT_EXPERIMENT_TYPE.to_string()
}

/// A modelling run inside a project: configuration in, metrics out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    #[serde(default = "ids::experiment_id")]
    id: String,
    pub name: String,
    #[serde(rename = "type", default = "default_type")]
    pub exp_type: String,
    #[serde(default)]
    pub description: String,
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
    status: ExperimentStatus,
    #[serde(default)]
    parameters: Map<String, Value>,
    #[serde(default)]
    results: Map<String, Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Experiment {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ids::experiment_id(),
            name: name.into(),
            exp_type: default_type(),
            description: String::new(),
            created_at: now,
            modified_at: now,
            status: ExperimentStatus::Pending,
            parameters: Map::new(),
            results: Map::new(),
            metadata: Map::new(),
        }
    }

    pub fn with_type(mut self, exp_type: impl Into<String>) -> Self {
        self.exp_type = exp_type.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> ExperimentStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    pub fn results(&self) -> &Map<String, Value> {
        &self.results
    }

    /// Parses and applies a status name such as `"Running"`.
    pub fn update_status(&mut self, status: &str) -> Result<()> {
        let status = status.parse()?;
        self.set_status(status);
        Ok(())
    }

    pub fn set_status(&mut self, status: ExperimentStatus) {
        self.status = status;
        self.touch();
    }

    /// Shallow merge: incoming keys overwrite, others are kept.
    pub fn set_parameters(&mut self, parameters: Map<String, Value>) {
        self.parameters.extend(parameters);
        self.touch();
    }

    /// Shallow merge: incoming keys overwrite, others are kept.
    pub fn set_results(&mut self, results: Map<String, Value>) {
        self.results.extend(results);
        self.touch();
    }

    fn touch(&mut self) {
        self.modified_at = Utc::now();
    }

    pub fn to_json(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| AimlError::json("serializing experiment", e))
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        Self::deserialize(value).map_err(|e| AimlError::json("parsing experiment", e))
    }
}
