//! Time primitives for the kiosk controller
//!
//! All engines run on a single monotonic device timeline measured from
//! controller start. Wall-clock time never drives a state transition.

use std::ops::{Add, Sub};
use std::time::Duration;

/// Device time - monotonic, microseconds since controller start
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DeviceTime(pub u64);

impl DeviceTime {
    pub const ZERO: DeviceTime = DeviceTime(0);

    #[inline]
    pub fn from_micros(micros: u64) -> Self {
        DeviceTime(micros)
    }

    #[inline]
    pub fn from_millis(millis: u64) -> Self {
        DeviceTime(millis * 1000)
    }

    #[inline]
    pub fn from_secs(secs: u64) -> Self {
        DeviceTime(secs * 1_000_000)
    }

    #[inline]
    pub fn from_secs_f64(secs: f64) -> Self {
        DeviceTime((secs.max(0.0) * 1_000_000.0) as u64)
    }

    #[inline]
    pub fn as_micros(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_millis(self) -> u64 {
        self.0 / 1000
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    #[inline]
    pub fn saturating_add(self, duration: Duration) -> Self {
        DeviceTime(self.0.saturating_add(duration.as_micros() as u64))
    }

    /// Elapsed time since `earlier`, zero if `earlier` is in the future
    #[inline]
    pub fn since(self, earlier: DeviceTime) -> Duration {
        self - earlier
    }
}

impl Add<Duration> for DeviceTime {
    type Output = DeviceTime;

    #[inline]
    fn add(self, rhs: Duration) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl Sub<DeviceTime> for DeviceTime {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: DeviceTime) -> Self::Output {
        Duration::from_micros(self.0.saturating_sub(rhs.0))
    }
}

impl std::fmt::Debug for DeviceTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t({:.3}s)", self.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_time_conversions() {
        let t = DeviceTime::from_millis(1500);
        assert_eq!(t.as_micros(), 1_500_000);
        assert_eq!(t.as_millis(), 1500);
        assert!((t.as_secs_f64() - 1.5).abs() < 1e-9);
        assert_eq!(DeviceTime::from_secs(2), DeviceTime::from_millis(2000));
    }

    #[test]
    fn test_device_time_subtraction_saturates() {
        let early = DeviceTime::from_secs(1);
        let late = DeviceTime::from_secs(3);

        assert_eq!(late - early, Duration::from_secs(2));
        // Out-of-order timestamps never produce a negative elapsed time
        assert_eq!(early - late, Duration::ZERO);
        assert_eq!(late.since(early), Duration::from_secs(2));
    }

    #[test]
    fn test_device_time_add() {
        let t = DeviceTime::from_secs(1) + Duration::from_millis(250);
        assert_eq!(t.as_millis(), 1250);
        assert_eq!(DeviceTime(u64::MAX) + Duration::from_secs(1), DeviceTime(u64::MAX));
    }
}
