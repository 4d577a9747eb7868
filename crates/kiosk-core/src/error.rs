//! Error types for the kiosk controller

use std::time::Duration;

use thiserror::Error;

/// Core kiosk errors
#[derive(Error, Debug)]
pub enum KioskError {
    // Transient I/O
    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Data integrity
    #[error("Malformed manifest: {0}")]
    MalformedManifest(String),

    #[error("Manifest missing field: {0}")]
    MissingField(&'static str),

    #[error("Digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    // Media
    #[error("Playback error: {0}")]
    Playback(String),

    // Configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Error category, for diagnostics only; every kind is handled the same way
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    TransientIo,
    DataIntegrity,
    Media,
    Configuration,
}

impl KioskError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KioskError::Fetch(_) | KioskError::HttpStatus { .. } | KioskError::Timeout(_) | KioskError::Io(_) => {
                ErrorKind::TransientIo
            }
            KioskError::MalformedManifest(_)
            | KioskError::MissingField(_)
            | KioskError::DigestMismatch { .. }
            | KioskError::CorruptRecord(_) => ErrorKind::DataIntegrity,
            KioskError::Playback(_) => ErrorKind::Media,
            KioskError::Config(_) => ErrorKind::Configuration,
        }
    }
}

/// Result type for kiosk operations
pub type KioskResult<T> = Result<T, KioskError>;
