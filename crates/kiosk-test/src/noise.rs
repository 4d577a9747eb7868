//! Sensor noise model
//!
//! Generates motion sample streams the way a mounted headset reports
//! them: a small noise floor while nobody touches it, sustained
//! acceleration while a visitor handles it, and short bumps when someone
//! knocks the stand.

use std::time::Duration;

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use kiosk_core::{DeviceTime, MotionSample, Vector3};

/// What the device is experiencing
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MotionPattern {
    /// Untouched; acceleration stays under the noise floor
    Still,
    /// Handled by a visitor, looking around
    Visitor,
    /// Knocked once; a burst shorter than `duration`
    Bump { duration: Duration },
}

/// Noise model configuration
#[derive(Clone, Debug)]
pub struct NoiseConfig {
    /// Sample period of the sensor
    pub sample_interval: Duration,
    /// Upper bound of per-axis noise while still (g)
    pub noise_floor: f64,
    /// Per-axis acceleration range while handled (g)
    pub visitor_accel: (f64, f64),
    /// Per-axis yaw drift per sample while handled (radians)
    pub visitor_turn: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_millis(100),
            noise_floor: 0.01,
            visitor_accel: (0.05, 0.4),
            visitor_turn: 0.05,
        }
    }
}

/// Seeded sample generator
pub struct SensorNoiseModel {
    config: NoiseConfig,
    rng: StdRng,
    yaw: f64,
}

impl SensorNoiseModel {
    pub fn new(config: NoiseConfig, seed: u64) -> Self {
        SensorNoiseModel {
            config,
            rng: StdRng::seed_from_u64(seed),
            yaw: 0.0,
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::new(NoiseConfig::default(), seed)
    }

    pub fn config(&self) -> &NoiseConfig {
        &self.config
    }

    /// One sample of `pattern` at `at`
    pub fn sample(&mut self, pattern: MotionPattern, at: DeviceTime) -> MotionSample {
        let accel = match pattern {
            MotionPattern::Still => {
                let floor = Uniform::new_inclusive(-self.config.noise_floor, self.config.noise_floor);
                // Summed magnitude stays under three times the floor
                Vector3::new(
                    floor.sample(&mut self.rng),
                    floor.sample(&mut self.rng),
                    floor.sample(&mut self.rng),
                )
            }
            MotionPattern::Visitor | MotionPattern::Bump { .. } => {
                let (lo, hi) = self.config.visitor_accel;
                let dist = Uniform::new_inclusive(lo, hi);
                let sign = |rng: &mut StdRng| if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                let x = dist.sample(&mut self.rng) * sign(&mut self.rng);
                let y = dist.sample(&mut self.rng) * sign(&mut self.rng);
                Vector3::new(x, y, 0.0)
            }
        };

        if pattern == MotionPattern::Visitor {
            self.yaw += self.rng.gen_range(-self.config.visitor_turn..=self.config.visitor_turn);
        }

        MotionSample::at_rest(at)
            .with_attitude(self.yaw, 0.0, std::f64::consts::FRAC_PI_2)
            .with_acceleration(accel)
    }

    /// Samples of `pattern` covering `[start, start + duration)`
    ///
    /// A `Bump` only produces motion for its own duration; the rest of the
    /// window is still.
    pub fn stream(&mut self, pattern: MotionPattern, start: DeviceTime, duration: Duration) -> Vec<MotionSample> {
        let step = self.config.sample_interval;
        let mut samples = Vec::new();
        let mut offset = Duration::ZERO;
        while offset < duration {
            let effective = match pattern {
                MotionPattern::Bump { duration: bump } if offset >= bump => MotionPattern::Still,
                other => other,
            };
            samples.push(self.sample(effective, start + offset));
            offset += step;
        }
        samples
    }
}
