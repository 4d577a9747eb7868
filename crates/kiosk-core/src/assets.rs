//! On-disk asset layout
//!
//! One directory holds exactly one current asset under a fixed name, the
//! in-flight download next to it, and the persisted version record. The
//! bundled fallback lives elsewhere and is read-only.

use std::path::{Path, PathBuf};

/// Default canonical asset file name
pub const DEFAULT_ASSET_NAME: &str = "current_video.mp4";

/// Default persisted record file name
pub const DEFAULT_RECORD_NAME: &str = "asset_state.json";

/// Where the kiosk keeps its content
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetLayout {
    /// Writable asset directory
    pub asset_dir: PathBuf,
    /// File name of the canonical asset inside `asset_dir`
    pub asset_name: String,
    /// File name of the persisted record inside `asset_dir`
    pub record_name: String,
    /// Bundled, read-only fallback asset
    pub fallback: PathBuf,
}

impl AssetLayout {
    pub fn new(asset_dir: impl Into<PathBuf>, fallback: impl Into<PathBuf>) -> Self {
        AssetLayout {
            asset_dir: asset_dir.into(),
            asset_name: DEFAULT_ASSET_NAME.to_string(),
            record_name: DEFAULT_RECORD_NAME.to_string(),
            fallback: fallback.into(),
        }
    }

    /// The single current asset
    pub fn canonical_path(&self) -> PathBuf {
        self.asset_dir.join(&self.asset_name)
    }

    /// Temporary download target, same filesystem as the canonical asset
    pub fn staging_path(&self) -> PathBuf {
        self.asset_dir.join(format!(".{}.download", self.asset_name))
    }

    /// Persisted version/FOV record
    pub fn record_path(&self) -> PathBuf {
        self.asset_dir.join(&self.record_name)
    }

    pub fn fallback_path(&self) -> &Path {
        &self.fallback
    }

    /// Does a canonical asset exist yet?
    pub fn has_canonical(&self) -> bool {
        self.canonical_path().is_file()
    }

    /// Asset the player should open: canonical if present, else the bundled fallback
    pub fn playable_source(&self) -> PathBuf {
        let canonical = self.canonical_path();
        if canonical.is_file() {
            canonical
        } else {
            self.fallback.clone()
        }
    }

    /// Create the asset directory if missing
    pub fn ensure_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.asset_dir)
    }
}
