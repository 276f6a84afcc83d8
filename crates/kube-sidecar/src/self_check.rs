//! Restart-on-change for the sidecar's own configuration file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{error, info};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use crate::error::ConfigError;

pub const CHECK_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// SHA-256 of the file content, hex encoded.
pub fn hash_file(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(format!("{:x}", Sha256::digest(&content)))
}

/// Polls `path` every `interval` and cancels `shutdown` once its content
/// changes or it can no longer be read.
///
/// Fails only when the file cannot be hashed at start-up.
pub async fn watch_config_file(
    path: PathBuf,
    interval: Duration,
    shutdown: CancellationToken,
) -> Result<(), ConfigError> {
    let original = hash_file(&path)?;
    info!(
        "Check config started on {} (hash: {})",
        path.display(),
        original
    );

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            _ = tokio::time::sleep(interval) => {}
        }

        match hash_file(&path) {
            Ok(hash) if hash == original => {}
            Ok(_) => {
                info!("New config found, stopping sidecar");
                shutdown.cancel();
                return Ok(());
            }
            Err(e) => {
                error!("{}", e);
                shutdown.cancel();
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hash_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sidecar.yaml");

        std::fs::write(&path, "Selectors: [secret/a=b]\n").unwrap();
        let first = hash_file(&path).unwrap();
        assert_eq!(first.len(), 64);
        assert_eq!(hash_file(&path).unwrap(), first);

        std::fs::write(&path, "Selectors: [secret/a=c]\n").unwrap();
        assert_ne!(hash_file(&path).unwrap(), first);
    }

    #[test]
    fn test_hash_missing_file() {
        let err = hash_file(Path::new("/no/such/sidecar.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[tokio::test]
    async fn test_change_cancels_token() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sidecar.yaml");
        std::fs::write(&path, "a: 1\n").unwrap();

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(watch_config_file(
            path.clone(),
            Duration::from_millis(20),
            shutdown.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!shutdown.is_cancelled());

        std::fs::write(&path, "a: 2\n").unwrap();
        tokio::time::timeout(Duration::from_secs(5), shutdown.cancelled())
            .await
            .unwrap();
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sidecar.yaml");
        std::fs::write(&path, "a: 1\n").unwrap();

        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let result = watch_config_file(path, Duration::from_secs(60), shutdown).await;
        assert!(result.is_ok());
    }
}
