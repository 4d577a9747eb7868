//! Playback resource seams

use std::path::Path;

use kiosk_core::{KioskResult, PlaybackHealth};

/// A live playback resource bound to one media file
pub trait MediaPlayer: Send {
    /// Sample current health; never blocks
    fn health(&mut self) -> PlaybackHealth;

    /// Start or continue playback
    fn resume(&mut self) -> KioskResult<()>;

    /// Stop advancing, keep the resource
    fn pause(&mut self) -> KioskResult<()>;

    /// Rewind to the first frame
    fn seek_to_start(&mut self) -> KioskResult<()>;

    /// Played through to the end since it was last started. Players whose
    /// end of media arrives as an event keep the default.
    fn reached_end(&mut self) -> bool {
        false
    }

    /// File this resource was built from
    fn source(&self) -> &Path;
}

/// Builds playback resources. Dropping a [`MediaPlayer`] tears it down.
pub trait PlayerFactory: Send {
    fn create(&mut self, source: &Path) -> KioskResult<Box<dyn MediaPlayer>>;
}

impl<F> PlayerFactory for F
where
    F: FnMut(&Path) -> KioskResult<Box<dyn MediaPlayer>> + Send,
{
    fn create(&mut self, source: &Path) -> KioskResult<Box<dyn MediaPlayer>> {
        self(source)
    }
}
