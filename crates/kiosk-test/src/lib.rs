//! Kiosk Test Harness - Simulation and end-to-end validation
//!
//! This crate provides:
//! - A seeded sensor noise model (still device, visitors, bumps)
//! - Scriptable fake players and an in-memory asset server
//! - A controller harness on a manual clock
//! - End-to-end scenarios across all engines

pub mod fakes;
pub mod harness;
pub mod noise;
pub mod scenarios;

pub use fakes::*;
pub use harness::*;
pub use noise::*;
pub use scenarios::*;
