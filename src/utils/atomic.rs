//! Atomic file operations
//!
//! Store files are replaced with the temp-file pattern:
//!
//! 1. Write to a sibling `.tmp` file
//! 2. Call `sync_all()` to flush to disk
//! 3. Rename over the final path (atomic on most filesystems)
//!
//! A reader therefore sees either the previous commit or the new one, never
//! a partially written file.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Result type for atomic operations
pub type AtomicResult<T> = Result<T, AtomicError>;

/// Errors that can occur during atomic operations
#[derive(Debug, Error)]
pub enum AtomicError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<AtomicError> for crate::error::StoreError {
    fn from(e: AtomicError) -> Self {
        match e {
            AtomicError::Io(e) => crate::error::StoreError::Io(e),
            AtomicError::Serialize(e) => crate::error::StoreError::Json(e),
        }
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Atomically write content using a writer function
pub fn atomic_write_with<P, F>(path: P, write_fn: F) -> AtomicResult<()>
where
    P: AsRef<Path>,
    F: FnOnce(&mut BufWriter<File>) -> AtomicResult<()>,
{
    let path = path.as_ref();
    let temp_path = temp_path_for(path);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(&temp_path)?);
    if let Err(e) = write_fn(&mut writer) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;

    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Atomically replace `path` with the JSON encoding of `value`
pub fn atomic_write_json<P, T>(path: P, value: &T) -> AtomicResult<()>
where
    P: AsRef<Path>,
    T: Serialize + ?Sized,
{
    atomic_write_with(path, |writer| {
        serde_json::to_writer(&mut *writer, value)?;
        writer.write_all(b"\n")?;
        Ok(())
    })
}

/// Remove a temp file left behind by an interrupted write to `path`
///
/// Returns whether a stale file was found.
pub fn cleanup_temp_file<P: AsRef<Path>>(path: P) -> AtomicResult<bool> {
    let temp_path = temp_path_for(path.as_ref());
    if !temp_path.exists() {
        return Ok(false);
    }
    fs::remove_file(&temp_path)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("default.store");

        atomic_write_json(&path, &json!({"schemaVersion": 0})).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\"schemaVersion\":0}\n");
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("subdir").join("nested").join("test.store");

        atomic_write_with(&path, |w| {
            w.write_all(b"nested content")?;
            Ok(())
        })
        .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "nested content");
    }

    #[test]
    fn test_failed_write_keeps_previous_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.store");
        fs::write(&path, "old").unwrap();

        let result = atomic_write_with(&path, |w| {
            w.write_all(b"half")?;
            Err(io::Error::new(io::ErrorKind::Other, "boom").into())
        });

        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "old");
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_cleanup_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.store");

        assert!(!cleanup_temp_file(&path).unwrap());

        fs::write(temp_path_for(&path), "partial").unwrap();
        assert!(cleanup_temp_file(&path).unwrap());
        assert!(!temp_path_for(&path).exists());
    }
}
