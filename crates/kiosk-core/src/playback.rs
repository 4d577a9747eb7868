//! Playback health as sampled from the playback resource

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

/// Health snapshot of the playback resource. Sampled, never owned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct PlaybackHealth {
    /// Media is currently advancing
    pub is_playing: bool,
    /// Decoder/resource reported an unrecoverable failure
    pub has_failed: bool,
}

impl PlaybackHealth {
    pub const PLAYING: PlaybackHealth = PlaybackHealth {
        is_playing: true,
        has_failed: false,
    };

    pub const STALLED: PlaybackHealth = PlaybackHealth {
        is_playing: false,
        has_failed: false,
    };

    pub const FAILED: PlaybackHealth = PlaybackHealth {
        is_playing: false,
        has_failed: true,
    };

    /// Playing and not failed
    pub fn is_healthy(&self) -> bool {
        self.is_playing && !self.has_failed
    }
}

/// Exclusive access to the canonical asset file.
///
/// The update pipeline holds it while swapping the file in; the playback
/// watchdog only ever `try_lock`s it and defers a recreate when busy.
#[derive(Clone, Debug, Default)]
pub struct MediaLock {
    inner: Arc<Mutex<()>>,
}

impl MediaLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the asset is free
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.inner.lock()
    }

    /// Take the asset if nobody else holds it
    pub fn try_lock(&self) -> Option<MutexGuard<'_, ()>> {
        self.inner.try_lock()
    }

    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}
