//! Kiosk Playback - Keeping the display alive
//!
//! The playback resource is an external collaborator reached through the
//! [`MediaPlayer`] / [`PlayerFactory`] seams. [`PlaybackWatchdog`] owns the
//! live resource and repairs it; [`ProcessPlayer`] drives an external
//! player command.

pub mod player;
pub mod process;
pub mod watchdog;

pub use player::*;
pub use process::*;
pub use watchdog::*;
