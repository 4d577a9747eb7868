//! Update status published as a JSON file
//!
//! The presentation layer polls this file for download progress and the
//! current field of view. Each write goes to `<file>.tmp` and is renamed
//! into place so readers never see a partial document.

use std::path::{Path, PathBuf};

use tokio::task::JoinHandle;

use kiosk_core::KioskResult;
use kiosk_update::{StatusHandle, UpdateStatus};

/// Write `status` to `path` atomically
pub async fn write_status_file(path: &Path, status: &UpdateStatus) -> KioskResult<()> {
    let json = serde_json::to_vec_pretty(status)
        .map_err(|e| kiosk_core::KioskError::Config(format!("status encoding: {}", e)))?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, &json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Rewrite `path` on every status change until the pipeline goes away
pub fn spawn_status_writer(status: StatusHandle, path: PathBuf) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rx = status.subscribe();
        loop {
            let snapshot = rx.borrow_and_update().clone();
            if let Err(e) = write_status_file(&path, &snapshot).await {
                tracing::warn!(path = %path.display(), error = %e, "status file write failed");
            }
            if rx.changed().await.is_err() {
                tracing::debug!("status source closed");
                return;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiosk_core::AssetVersion;

    #[tokio::test]
    async fn test_write_status_file_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");

        let mut status = UpdateStatus::new(75.0, None);
        write_status_file(&path, &status).await.unwrap();

        status.installed_version = Some(AssetVersion::from(9));
        status.field_of_view = 90.0;
        write_status_file(&path, &status).await.unwrap();

        let value: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["field_of_view"], 90.0);
        assert_eq!(value["installed_version"], "9");
        assert!(!dir.path().join("status.json.tmp").exists());
    }
}
