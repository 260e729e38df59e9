//! Error types for aiml-core operations.
//!
//! Every fallible operation returns [`Result`]. Callers (UI callbacks) render
//! `err.to_string()` directly, so messages name the offending value or holder.

use std::path::PathBuf;

/// All errors that can occur in aiml-core operations.
#[derive(Debug, thiserror::Error)]
pub enum AimlError {
    // ─────────────────────────────────────────────────────────────────────
    // Project Lock Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Project is locked by {holder}. Unlock before making changes.")]
    ProjectLocked { holder: String },

    #[error("Project is already locked by {holder}")]
    AlreadyLocked { holder: String },

    #[error("Project is locked by {holder}; {user} cannot unlock it. Use force to override.")]
    NotLockHolder { holder: String, user: String },

    // ─────────────────────────────────────────────────────────────────────
    // Validation Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Invalid status '{0}'. Must be one of Pending, Running, Completed, Failed, Cancelled")]
    InvalidStatus(String),

    #[error("Invalid project format '{0}'. Use 'json' or 'pickle'")]
    InvalidProjectFormat(String),

    #[error("Invalid filter expression: {0}")]
    InvalidQuery(String),

    #[error("Invalid row selection: {0}")]
    InvalidRowSelection(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    // ─────────────────────────────────────────────────────────────────────
    // Not Found / Precondition Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Project {0} not found")]
    ProjectNotFound(String),

    #[error("No active project")]
    NoActiveProject,

    #[error("Dataset '{0}' not found")]
    DatasetNotFound(String),

    #[error("Dataset '{0}' has no data")]
    DatasetHasNoData(String),

    // ─────────────────────────────────────────────────────────────────────
    // Format Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Incompatible state version: {found} (expected {expected})")]
    IncompatibleVersion { found: String, expected: String },

    #[error("Corrupt binary file: {0}")]
    CorruptBinary(String),

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("YAML error: {context}: {source}")]
    Yaml {
        context: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("CSV error: {context}: {source}")]
    Csv {
        context: String,
        #[source]
        source: csv::Error,
    },

    #[error("Base64 error: {context}: {source}")]
    Base64 {
        context: String,
        #[source]
        source: base64::DecodeError,
    },
}

/// Convenience type alias for Results using AimlError.
pub type Result<T> = std::result::Result<T, AimlError>;

impl AimlError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        AimlError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        AimlError::Json {
            context: context.into(),
            source,
        }
    }
}

// Conversion for string error compatibility
impl From<AimlError> for String {
    fn from(err: AimlError) -> String {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locked_message_names_holder() {
        let err = AimlError::ProjectLocked {
            holder: "alice".to_string(),
        };
        assert!(err.to_string().contains("alice"));
    }

    #[test]
    fn test_version_message_mentions_version() {
        let err = AimlError::IncompatibleVersion {
            found: "0.1".to_string(),
            expected: "2.x".to_string(),
        };
        let msg: String = err.into();
        assert!(msg.to_lowercase().contains("version"));
        assert!(msg.contains("0.1"));
    }
}
