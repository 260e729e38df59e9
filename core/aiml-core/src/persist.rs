//! Small file helpers shared by every component that writes to disk.

use crate::error::{AimlError, Result};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Replaces `path` with `contents` in one step.
///
/// The bytes go to a sibling temp file that is synced and renamed over the
/// target, so a reader sees either the old file or the new one.
pub(crate) fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let fail = |stage: &str| {
        let target = path.display().to_string();
        let stage = stage.to_string();
        move |e: std::io::Error| AimlError::io(format!("saving {}: {}", target, stage), e)
    };

    let mut staged = NamedTempFile::new_in(dir).map_err(fail("staging"))?;
    staged.write_all(contents).map_err(fail("writing"))?;
    staged.as_file().sync_all().map_err(fail("syncing"))?;
    staged
        .persist(path)
        .map_err(|e| fail("replacing")(e.error))?;
    Ok(())
}

/// Reads a whole file, mapping a missing file to [`AimlError::FileNotFound`].
pub(crate) fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(AimlError::FileNotFound(path.to_path_buf()));
    }
    fs_err::read(path).map_err(|e| AimlError::io(format!("loading {}", path.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write_then_read() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("out.json");
        atomic_write(&file, b"{\"a\":1}").unwrap();
        assert_eq!(read_bytes(&file).unwrap(), b"{\"a\":1}");
    }

    #[test]
    fn test_atomic_write_overwrites() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("out.txt");
        atomic_write(&file, b"first").unwrap();
        atomic_write(&file, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "second");
    }

    #[test]
    fn test_atomic_write_into_missing_directory_names_target() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("absent").join("out.json");
        let err = atomic_write(&file, b"{}").unwrap_err();
        assert!(matches!(err, AimlError::Io { .. }));
        assert!(err.to_string().contains("out.json"));
        assert!(!file.exists());
    }

    #[test]
    fn test_read_missing_file_is_not_found() {
        let temp = tempdir().unwrap();
        let err = read_bytes(&temp.path().join("missing.bin")).unwrap_err();
        assert!(matches!(err, AimlError::FileNotFound(_)));
    }
}
