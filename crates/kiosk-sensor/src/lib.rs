//! Kiosk Sensor - Motion stream consumers
//!
//! Both engines consume the same raw motion stream (fan-out, nothing shared):
//! - OrientationTracker: calibrated, clamped camera orientation
//! - ActivityStateMachine: Awake / LowPower / Sleep with debounced wake

pub mod activity;
pub mod orientation;

pub use activity::*;
pub use orientation::*;
