use super::timestamp;
use crate::error::{AimlError, Result};
use crate::ids;
use crate::table::{format_size, SplitFrame, Table, TablePayload};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Where a project dataset came from. Details live in `source_info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetSource {
    /// `source_info`: `path`
    #[default]
    File,
    /// `source_info`: `connection`, `query`
    Database,
    /// `source_info`: `url`
    Api,
    Existing,
    /// Copied from the workspace; `source_info`: `origin`, `load_command`
    DataManager,
}

impl DatasetSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetSource::File => "file",
            DatasetSource::Database => "database",
            DatasetSource::Api => "api",
            DatasetSource::Existing => "existing",
            DatasetSource::DataManager => "datamanager",
        }
    }
}

impl fmt::Display for DatasetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn empty_size() -> String {
    "0 KB".to_string()
}

/// A dataset owned by a project.
///
/// The payload is exclusively owned: [`Dataset::set_data`] copies in and
/// [`Dataset::data`] copies out. Row, column and size fields are derived and
/// only change through `set_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default = "ids::dataset_id")]
    id: String,
    pub name: String,
    #[serde(default)]
    pub source: DatasetSource,
    #[serde(default)]
    source_info: Map<String, Value>,
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
    rows: usize,
    #[serde(default)]
    columns: usize,
    #[serde(default = "empty_size")]
    size: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(skip)]
    payload: Option<Table>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, source: DatasetSource) -> Self {
        let now = Utc::now();
        Self {
            id: ids::dataset_id(),
            name: name.into(),
            source,
            source_info: Map::new(),
            description: String::new(),
            created_at: now,
            modified_at: now,
            rows: 0,
            columns: 0,
            size: empty_size(),
            metadata: Map::new(),
            payload: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Human-readable payload size computed at the last `set_data`.
    pub fn size(&self) -> &str {
        &self.size
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    pub fn source_info(&self) -> &Map<String, Value> {
        &self.source_info
    }

    /// `source_info[key]` as a string, empty when absent or not a string.
    pub fn source_info_str(&self, key: &str) -> &str {
        self.source_info
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Shallow merge into `source_info`.
    pub fn set_source_info(&mut self, info: Map<String, Value>) {
        self.source_info.extend(info);
        self.modified_at = Utc::now();
    }

    pub fn set_data(&mut self, table: &Table) {
        self.rows = table.n_rows();
        self.columns = table.n_columns();
        self.size = format_size(table.memory_usage_bytes());
        self.payload = Some(table.clone());
        self.modified_at = Utc::now();
    }

    /// A copy of the payload, or `None` if none was ever attached.
    pub fn data(&self) -> Option<Table> {
        self.payload.clone()
    }

    pub fn has_data(&self) -> bool {
        self.payload.is_some()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Serialization
    // ─────────────────────────────────────────────────────────────────────────────

    /// With `include_data`, the payload is inlined as `data` (split frame),
    /// `dtypes` and `index_name`.
    pub fn to_json(&self, include_data: bool) -> Result<Value> {
        let mut value =
            serde_json::to_value(self).map_err(|e| AimlError::json("serializing dataset", e))?;
        if let (true, Some(table), Value::Object(map)) = (include_data, &self.payload, &mut value) {
            let payload = table.to_payload();
            map.insert("data".to_string(), payload_value(&payload.data)?);
            map.insert("dtypes".to_string(), payload_value(&payload.dtypes)?);
            map.insert(
                "index_name".to_string(),
                payload.index_name.map(Value::String).unwrap_or(Value::Null),
            );
        }
        Ok(value)
    }

    /// Best-effort reconstruction. A payload that fails to rebuild is dropped
    /// with a warning; the metadata is still returned.
    pub fn from_json(value: &Value) -> Result<Self> {
        let mut dataset =
            Self::deserialize(value).map_err(|e| AimlError::json("parsing dataset", e))?;

        if let Some(data) = value.get("data").filter(|v| !v.is_null()) {
            match restore_payload(data, value) {
                Ok(table) => dataset.payload = Some(table),
                Err(err) => tracing::warn!(
                    error = %err,
                    dataset = %dataset.name,
                    "Dropping dataset payload that could not be restored"
                ),
            }
        }
        Ok(dataset)
    }
}

fn restore_payload(data: &Value, record: &Value) -> Result<Table> {
    let frame: SplitFrame = serde_json::from_value(data.clone())
        .map_err(|e| AimlError::json("parsing dataset payload", e))?;
    let dtypes: BTreeMap<String, String> = record
        .get("dtypes")
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| AimlError::json("parsing dataset dtypes", e))?
        .unwrap_or_default();
    let index_name = record
        .get("index_name")
        .and_then(Value::as_str)
        .map(str::to_string);
    Table::from_payload(TablePayload {
        data: frame,
        dtypes,
        index_name,
    })
}

fn payload_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| AimlError::json("serializing dataset payload", e))
}
