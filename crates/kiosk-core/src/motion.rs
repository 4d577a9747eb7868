//! Motion samples - raw device-motion input and derived camera orientation
//!
//! Samples arrive at the sensor rate (~30 Hz) and are transient: nothing
//! here is persisted.

use serde::{Deserialize, Serialize};

use crate::DeviceTime;

/// Nominal sensor rate in Hz
pub const NOMINAL_SAMPLE_RATE_HZ: u32 = 30;

/// 3-vector in device coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// All components finite (no NaN / infinity)
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// |x| + |y| + |z|
    pub fn manhattan_norm(&self) -> f64 {
        self.x.abs() + self.y.abs() + self.z.abs()
    }

    /// Euclidean length
    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// One device-motion reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    /// Attitude yaw (radians)
    pub yaw: f64,
    /// Attitude pitch (radians)
    pub pitch: f64,
    /// Attitude roll (radians)
    pub roll: f64,
    /// Gravity direction, unit length
    pub gravity: Vector3,
    /// Acceleration the user imparts to the device, gravity removed
    pub user_acceleration: Vector3,
    /// Receipt time on the device timeline
    pub timestamp: DeviceTime,
}

impl MotionSample {
    /// Sample at rest: level, facing the origin, no user acceleration
    pub fn at_rest(timestamp: DeviceTime) -> Self {
        MotionSample {
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            gravity: Vector3::new(0.0, 0.0, -1.0),
            user_acceleration: Vector3::ZERO,
            timestamp,
        }
    }

    /// Same sample with a different user acceleration
    pub fn with_acceleration(mut self, acceleration: Vector3) -> Self {
        self.user_acceleration = acceleration;
        self
    }

    /// Same sample with a different attitude
    pub fn with_attitude(mut self, yaw: f64, pitch: f64, roll: f64) -> Self {
        self.yaw = yaw;
        self.pitch = pitch;
        self.roll = roll;
        self
    }

    /// Orientation inputs are all finite
    pub fn has_finite_attitude(&self) -> bool {
        self.yaw.is_finite() && self.pitch.is_finite() && self.roll.is_finite() && self.gravity.is_finite()
    }

    /// Every field is finite
    pub fn is_finite(&self) -> bool {
        self.has_finite_attitude() && self.user_acceleration.is_finite()
    }

    /// Activity magnitude: |ax| + |ay| + |az|
    pub fn total_acceleration(&self) -> f64 {
        self.user_acceleration.manhattan_norm()
    }
}

/// Camera orientation handed to the render service
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CameraOrientation {
    /// Horizontal angle relative to the calibrated forward (radians)
    pub yaw: f64,
    /// Vertical angle, clamped (radians)
    pub pitch: f64,
}
