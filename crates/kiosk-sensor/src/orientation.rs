//! Orientation Tracker - device attitude to camera orientation
//!
//! The first valid sample after (re)calibration defines "forward"; every
//! later sample is expressed relative to it. Vertical angle is clamped so
//! a tilted device or a sensor glitch never produces an unnatural view.

use std::f64::consts::{FRAC_PI_2, PI};

use kiosk_core::{CameraOrientation, MotionSample};

/// Where the vertical camera angle comes from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PitchSource {
    /// asin(gravity.z): works for any device orientation
    #[default]
    GravityZ,
    /// Attitude roll, for devices mounted upright in landscape (roll ≈ π/2 when level)
    Roll,
}

/// Orientation Tracker configuration
#[derive(Clone, Debug)]
pub struct OrientationConfig {
    /// Maximum vertical angle magnitude (radians)
    pub max_pitch: f64,
    /// Vertical angle source
    pub pitch_source: PitchSource,
    /// Exponential smoothing factor in [0, 1); 0 emits raw orientation
    pub smoothing: f64,
}

impl Default for OrientationConfig {
    fn default() -> Self {
        OrientationConfig {
            max_pitch: 60.0_f64.to_radians(),
            pitch_source: PitchSource::GravityZ,
            smoothing: 0.0,
        }
    }
}

/// Calibration and last emitted orientation
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OrientationState {
    /// Forward reference, set once per calibration
    pub reference_yaw: Option<f64>,
    pub current_yaw: f64,
    pub current_pitch: f64,
}

/// Tracker counters
#[derive(Clone, Debug, Default)]
pub struct OrientationStats {
    pub samples: u64,
    pub dropped_samples: u64,
    pub calibrations: u64,
}

/// Orientation Tracker - sole owner of [`OrientationState`]
pub struct OrientationTracker {
    state: OrientationState,
    config: OrientationConfig,
    stats: OrientationStats,
}

impl OrientationTracker {
    /// Create a tracker with default configuration
    pub fn new() -> Self {
        Self::with_config(OrientationConfig::default())
    }

    /// Create a tracker with custom configuration
    pub fn with_config(mut config: OrientationConfig) -> Self {
        config.max_pitch = config.max_pitch.abs().min(FRAC_PI_2);
        config.smoothing = if config.smoothing.is_finite() {
            config.smoothing.clamp(0.0, 0.99)
        } else {
            0.0
        };
        OrientationTracker {
            state: OrientationState::default(),
            config,
            stats: OrientationStats::default(),
        }
    }

    /// Consume one sample. Returns `None` for samples with non-finite
    /// attitude; those leave the state untouched.
    pub fn on_motion_sample(&mut self, sample: &MotionSample) -> Option<CameraOrientation> {
        if !sample.has_finite_attitude() {
            self.stats.dropped_samples += 1;
            tracing::trace!(?sample, "dropping non-finite motion sample");
            return None;
        }
        self.stats.samples += 1;

        let first = self.state.reference_yaw.is_none();
        let reference = *self.state.reference_yaw.get_or_insert(sample.yaw);
        if first {
            self.stats.calibrations += 1;
            tracing::debug!(reference_yaw = reference, "orientation forward calibrated");
        }

        let target_yaw = wrap_angle(sample.yaw - reference);
        let target_pitch = self.vertical_angle(sample);

        let (yaw, pitch) = if first || self.config.smoothing == 0.0 {
            (target_yaw, target_pitch)
        } else {
            let k = 1.0 - self.config.smoothing;
            let yaw = wrap_angle(self.state.current_yaw + k * wrap_angle(target_yaw - self.state.current_yaw));
            let pitch = self.state.current_pitch + k * (target_pitch - self.state.current_pitch);
            (yaw, pitch)
        };

        self.state.current_yaw = yaw;
        self.state.current_pitch = pitch;

        Some(CameraOrientation { yaw, pitch })
    }

    /// Forget the forward reference; the next valid sample redefines it
    pub fn recalibrate(&mut self) {
        self.state.reference_yaw = None;
        tracing::info!("orientation recalibration requested");
    }

    pub fn state(&self) -> &OrientationState {
        &self.state
    }

    pub fn is_calibrated(&self) -> bool {
        self.state.reference_yaw.is_some()
    }

    pub fn stats(&self) -> &OrientationStats {
        &self.stats
    }

    pub fn config(&self) -> &OrientationConfig {
        &self.config
    }

    fn vertical_angle(&self, sample: &MotionSample) -> f64 {
        let raw = match self.config.pitch_source {
            PitchSource::GravityZ => sample.gravity.z.clamp(-1.0, 1.0).asin(),
            PitchSource::Roll => wrap_angle(sample.roll - FRAC_PI_2),
        };
        raw.clamp(-self.config.max_pitch, self.config.max_pitch)
    }
}

impl Default for OrientationTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap an angle into (-π, π]
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped == -PI {
        PI
    } else {
        wrapped
    }
}
