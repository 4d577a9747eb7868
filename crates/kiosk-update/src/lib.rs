//! Kiosk Update - Remote asset updates
//!
//! One check cycle: fetch the manifest, apply its field of view, compare
//! version tokens, download to a staging file, verify, then install with a
//! journaled record so the installed token never disagrees with the file.

pub mod digest;
pub mod fetch;
pub mod manifest;
pub mod pipeline;
pub mod status;
pub mod store;

pub use digest::*;
pub use fetch::*;
pub use manifest::*;
pub use pipeline::*;
pub use status::*;
pub use store::*;
