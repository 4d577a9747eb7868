//! Kiosk Runtime - Controller and daemon
//!
//! Wires the engines into one running kiosk:
//! 1. Receive motion datagrams from the sensor bridge
//! 2. Track orientation and activity
//! 3. Apply power directives to the render surface
//! 4. Keep playback alive with the watchdog
//! 5. Poll the manifest and install new assets in the background
//! 6. Publish update status for the presentation layer

pub mod config;
pub mod controller;
pub mod daemon;
pub mod event_loop;
pub mod logging;
pub mod motion_link;
pub mod render;
pub mod status_file;

pub use config::*;
pub use controller::*;
pub use daemon::*;
pub use event_loop::*;
pub use logging::*;
pub use motion_link::*;
pub use render::*;
pub use status_file::*;
