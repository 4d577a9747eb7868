//! Published update status
//!
//! The presentation layer reads progress, the downloading flag and the
//! field of view from here. It never writes back.

use serde::Serialize;
use tokio::sync::watch;

use kiosk_core::AssetVersion;

use crate::UpdateOutcome;

/// Step of the current check cycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePhase {
    #[default]
    Idle,
    Checking,
    Downloading,
    Verifying,
    Installing,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UpdateStatus {
    pub phase: UpdatePhase,
    /// Download progress in [0, 1]; `None` when the size is unknown or idle
    pub progress: Option<f64>,
    pub is_downloading: bool,
    /// Field of view in force (degrees)
    pub field_of_view: f64,
    pub installed_version: Option<AssetVersion>,
    pub last_outcome: Option<UpdateOutcome>,
    /// Completed check cycles
    pub checks: u64,
}

impl UpdateStatus {
    pub fn new(field_of_view: f64, installed_version: Option<AssetVersion>) -> Self {
        UpdateStatus {
            phase: UpdatePhase::Idle,
            progress: None,
            is_downloading: false,
            field_of_view,
            installed_version,
            last_outcome: None,
            checks: 0,
        }
    }
}

/// Read-only view of the pipeline status
#[derive(Clone, Debug)]
pub struct StatusHandle {
    rx: watch::Receiver<UpdateStatus>,
}

impl StatusHandle {
    pub(crate) fn new(rx: watch::Receiver<UpdateStatus>) -> Self {
        StatusHandle { rx }
    }

    /// Current status
    pub fn snapshot(&self) -> UpdateStatus {
        self.rx.borrow().clone()
    }

    /// Receiver notified on every change
    pub fn subscribe(&self) -> watch::Receiver<UpdateStatus> {
        self.rx.clone()
    }
}

/// Download progress ratio; `None` when the total is unknown
pub fn progress_ratio(written: u64, total: Option<u64>) -> Option<f64> {
    match total {
        Some(0) | None => None,
        Some(total) => Some((written as f64 / total as f64).min(1.0)),
    }
}
