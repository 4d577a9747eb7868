//! Persisted asset record with install journal
//!
//! The record holds the installed version token, the last applied field of
//! view and, while an install is in flight, a `pending` entry naming the
//! version and digest about to land. Writes go to a sibling temp file and
//! are renamed into place.
//!
//! Install protocol:
//! 1. `begin_install` persists `pending`
//! 2. caller moves the staged asset over the canonical file
//! 3. `commit_install` promotes `pending` to the installed version
//!
//! A crash between 1 and 3 leaves `pending` behind; [`VersionStore::resolve_pending`]
//! settles it against the digest of the canonical file at startup.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use kiosk_core::{AssetVersion, KioskError, KioskResult};

/// An install that was started but not yet committed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInstall {
    pub version: AssetVersion,
    pub sha256: String,
}

/// On-disk record
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_version: Option<AssetVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_of_view: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingInstall>,
}

/// How a leftover journal entry was settled
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recovery {
    /// No install was in flight
    Clean,
    /// The file had been moved; the pending version is now installed
    Committed(AssetVersion),
    /// The file never landed; the pending entry was dropped
    Discarded(AssetVersion),
}

/// Owner of the persisted record
#[derive(Debug)]
pub struct VersionStore {
    path: PathBuf,
    record: AssetRecord,
}

impl VersionStore {
    /// Load the record at `path`. A missing file is an empty record; an
    /// unreadable one is logged and treated as empty so the kiosk falls
    /// back to its bundled baseline.
    pub fn open(path: impl Into<PathBuf>) -> KioskResult<Self> {
        let path = path.into();
        let record = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(record) => record,
                Err(e) => {
                    let err = KioskError::CorruptRecord(format!("{}: {}", path.display(), e));
                    tracing::warn!(error = %err, "ignoring asset record");
                    AssetRecord::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => AssetRecord::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(VersionStore { path, record })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self) -> &AssetRecord {
        &self.record
    }

    pub fn installed_version(&self) -> Option<&AssetVersion> {
        self.record.asset_version.as_ref()
    }

    pub fn field_of_view(&self) -> Option<f64> {
        self.record.field_of_view
    }

    pub fn pending(&self) -> Option<&PendingInstall> {
        self.record.pending.as_ref()
    }

    /// Persist a field of view; unchanged values are not rewritten
    pub fn set_field_of_view(&mut self, fov: f64) -> KioskResult<()> {
        if self.record.field_of_view == Some(fov) {
            return Ok(());
        }
        self.update(|r| r.field_of_view = Some(fov))
    }

    /// Journal an install before the file move
    pub fn begin_install(&mut self, version: AssetVersion, sha256: String) -> KioskResult<()> {
        self.update(|r| r.pending = Some(PendingInstall { version, sha256 }))
    }

    /// Promote the journaled install after the file move
    pub fn commit_install(&mut self) -> KioskResult<AssetVersion> {
        let pending = self
            .record
            .pending
            .clone()
            .ok_or_else(|| KioskError::CorruptRecord("commit without a pending install".into()))?;
        self.update(|r| {
            r.asset_version = Some(pending.version.clone());
            r.pending = None;
        })?;
        Ok(pending.version)
    }

    /// Drop the journaled install; the installed version is unchanged
    pub fn abort_install(&mut self) -> KioskResult<()> {
        if self.record.pending.is_none() {
            return Ok(());
        }
        self.update(|r| r.pending = None)
    }

    /// Settle a leftover journal entry. `canonical_sha256` is the digest
    /// of the canonical asset, `None` if there is no such file.
    pub fn resolve_pending(&mut self, canonical_sha256: Option<&str>) -> KioskResult<Recovery> {
        let Some(pending) = self.record.pending.clone() else {
            return Ok(Recovery::Clean);
        };
        if canonical_sha256 == Some(pending.sha256.as_str()) {
            let version = self.commit_install()?;
            tracing::info!(version = %version, "recovered interrupted install");
            Ok(Recovery::Committed(version))
        } else {
            self.abort_install()?;
            tracing::warn!(version = %pending.version, "discarded interrupted install");
            Ok(Recovery::Discarded(pending.version))
        }
    }

    /// Apply a change to a copy, persist it, then adopt it
    fn update(&mut self, change: impl FnOnce(&mut AssetRecord)) -> KioskResult<()> {
        let mut next = self.record.clone();
        change(&mut next);
        self.persist(&next)?;
        self.record = next;
        Ok(())
    }

    fn persist(&self, record: &AssetRecord) -> KioskResult<()> {
        let json = serde_json::to_vec_pretty(record).map_err(|e| KioskError::CorruptRecord(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.temp_path();
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
