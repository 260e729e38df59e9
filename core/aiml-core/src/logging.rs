//! Tracing subscriber setup for binaries embedding aiml-core.
//!
//! Library code only emits `tracing` events; installing a subscriber is the
//! host's choice. `init` writes to a daily rolling file under
//! [`StorageConfig::logs_dir`], falling back to stderr when the directory
//! cannot be created.

use crate::storage::StorageConfig;
use std::env;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Set to `1`, `true` or `yes` to force debug-level output.
pub const DEBUG_ENV_VAR: &str = "AIML_DEBUG_LOG";

const LOG_FILE_PREFIX: &str = "aiml-core.log";

fn debug_enabled() -> bool {
    env::var(DEBUG_ENV_VAR)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

fn env_filter() -> EnvFilter {
    if debug_enabled() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Installs the global subscriber.
///
/// Keep the returned guard alive for the lifetime of the process; dropping it
/// flushes and stops the background writer. Returns `None` when logging goes to
/// stderr or a subscriber was already installed.
pub fn init(storage: &StorageConfig) -> Option<WorkerGuard> {
    let logs_dir = storage.logs_dir();
    if let Err(err) = std::fs::create_dir_all(&logs_dir) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_writer(std::io::stderr)
            .try_init();
        tracing::warn!(error = %err, dir = %logs_dir.display(), "Log directory unavailable, logging to stderr");
        return None;
    }

    let appender = tracing_appender::rolling::daily(&logs_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    match tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
    {
        Ok(()) => Some(guard),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_logs_dir() {
        let temp = TempDir::new().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        let _guard = init(&storage);
        assert!(storage.logs_dir().exists());
    }

    #[test]
    fn test_second_init_is_harmless() {
        let temp = TempDir::new().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        let _first = init(&storage);
        let second = init(&storage);
        assert!(second.is_none());
    }
}
