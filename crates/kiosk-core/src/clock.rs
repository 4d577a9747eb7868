//! Clock implementations for the kiosk engines
//!
//! Engines never read the OS clock themselves; they are handed a
//! [`DeviceTime`] by whoever drives them. The runtime drives them from a
//! [`MonotonicClock`], tests and simulations from a [`ManualClock`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::DeviceTime;

/// Source of device time
pub trait Clock: Send + Sync {
    /// Current device time
    fn now(&self) -> DeviceTime;
}

/// Monotonic clock backed by the OS monotonic timer
/// INVARIANT: `now()` never decreases
#[derive(Clone, Debug)]
pub struct MonotonicClock {
    /// Controller start instant
    reference: Instant,
}

impl MonotonicClock {
    /// Create a clock starting at zero now
    pub fn new() -> Self {
        MonotonicClock {
            reference: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> DeviceTime {
        DeviceTime::from_micros(self.reference.elapsed().as_micros() as u64)
    }
}

/// Manually advanced clock for deterministic tests and simulation
///
/// Clones share the same underlying time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    value: Arc<Mutex<DeviceTime>>,
}

impl ManualClock {
    /// Create a manual clock starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manual clock starting at `start`
    pub fn starting_at(start: DeviceTime) -> Self {
        ManualClock {
            value: Arc::new(Mutex::new(start)),
        }
    }

    /// Advance by `dt` and return the new time
    pub fn advance(&self, dt: Duration) -> DeviceTime {
        let mut value = self.value.lock();
        *value = value.saturating_add(dt);
        *value
    }

    /// Jump to `target` (only forward)
    pub fn set(&self, target: DeviceTime) {
        let mut value = self.value.lock();
        if target > *value {
            *value = target;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DeviceTime {
        *self.value.lock()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DeviceTime {
        (**self).now()
    }
}
