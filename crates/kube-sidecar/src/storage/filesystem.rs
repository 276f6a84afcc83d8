use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::StorageError;

/// Replaces the content of `path`, creating parent directories first.
///
/// The content goes to a temporary file in the same directory which is then
/// renamed over the target, so readers see either the old or the new file.
pub fn write_atomic(path: &Path, content: &str) -> Result<(), StorageError> {
    let parent = parent_dir(path)?;
    ensure_directory(parent)?;

    let mut file = NamedTempFile::new_in(parent).map_err(|e| StorageError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    file.write_all(content.as_bytes())
        .map_err(|e| StorageError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })?;
    file.persist(path).map_err(|e| StorageError::WriteFile {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    log::debug!("{} bytes written to {}", content.len(), path.display());
    Ok(())
}

/// Runs [`write_atomic`] on the blocking pool.
pub async fn write_file(path: &Path, content: &str) -> Result<(), StorageError> {
    let target = path.to_path_buf();
    let content = content.to_string();
    tokio::task::spawn_blocking(move || write_atomic(&target, &content))
        .await
        .map_err(|e| StorageError::WriteFile {
            path: path.to_path_buf(),
            source: std::io::Error::other(e),
        })?
}

/// Removes `path`. Returns false when there was nothing to remove.
pub async fn remove_file(path: &Path) -> Result<bool, StorageError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            log::debug!("Deleted {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StorageError::RemoveFile {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Creates `path` and its ancestors; succeeds if it already exists.
pub fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.is_dir() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

fn parent_dir(path: &Path) -> Result<&Path, StorageError> {
    match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Ok(Path::new(".")),
        Some(parent) => Ok(parent),
        None => Err(StorageError::NoParent(path.to_path_buf())),
    }
}
