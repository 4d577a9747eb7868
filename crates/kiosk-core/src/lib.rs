//! Kiosk Core - Fundamental types and primitives
//!
//! This crate defines the core types shared by every kiosk component:
//! - Device time and injectable clocks
//! - Motion samples and camera orientation
//! - Activity states and playback health
//! - Asset version tokens and the on-disk asset layout
//! - Side-effect directives and the error taxonomy

pub mod activity;
pub mod assets;
pub mod clock;
pub mod directive;
pub mod error;
pub mod motion;
pub mod playback;
pub mod time;
pub mod version;

pub use activity::*;
pub use assets::*;
pub use clock::*;
pub use directive::*;
pub use error::*;
pub use motion::*;
pub use playback::*;
pub use time::*;
pub use version::*;
