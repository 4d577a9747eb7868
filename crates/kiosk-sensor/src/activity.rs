//! Activity State Machine - Awake / LowPower / Sleep
//!
//! Transitions are a pure function of (current state, time since the last
//! accepted activity, new activity event). The machine never touches the
//! device: every transition carries the directives the runtime must apply.
//!
//! Decay:  Awake -> LowPower after `idle_threshold`, -> Sleep after `sleep_threshold`
//! Wake:   LowPower -> Awake immediately on qualifying motion,
//!         Sleep -> Awake only after `wake_debounce` of continuous qualifying motion

use std::time::Duration;

use kiosk_core::{ActivityState, DeviceTime, Directive, KioskError, KioskResult, MotionSample, PowerProfile};

/// Activity State Machine configuration
#[derive(Clone, Debug)]
pub struct ActivityConfig {
    /// |ax| + |ay| + |az| above this counts as activity (g)
    pub motion_threshold: f64,
    /// Idle time before LowPower
    pub idle_threshold: Duration,
    /// Idle time before Sleep
    pub sleep_threshold: Duration,
    /// Continuous activity required to leave Sleep
    pub wake_debounce: Duration,
    /// Largest gap between qualifying samples that still counts as continuous
    pub max_sample_gap: Duration,
    /// Decay evaluation interval
    pub tick_interval: Duration,
    /// Profile applied while Awake
    pub awake: PowerProfile,
    /// Profile applied while LowPower
    pub low_power: PowerProfile,
    /// Profile applied while asleep
    pub sleep: PowerProfile,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        // Reference kiosk behaviour
        ActivityConfig {
            motion_threshold: 0.05,
            idle_threshold: Duration::from_secs(30),
            sleep_threshold: Duration::from_secs(60),
            wake_debounce: Duration::from_millis(500),
            max_sample_gap: Duration::from_millis(250),
            tick_interval: Duration::from_secs(10),
            awake: PowerProfile::for_state(ActivityState::Awake),
            low_power: PowerProfile::for_state(ActivityState::LowPower),
            sleep: PowerProfile::for_state(ActivityState::Sleep),
        }
    }
}

impl ActivityConfig {
    /// Configuration for busy public venues: longer idle windows, a less
    /// sensitive threshold and a longer wake debounce against passing bumps.
    pub fn busy_venue() -> Self {
        ActivityConfig {
            motion_threshold: 0.12,
            idle_threshold: Duration::from_secs(120),
            sleep_threshold: Duration::from_secs(600),
            wake_debounce: Duration::from_millis(800),
            ..Self::default()
        }
    }

    /// Profile for a state
    pub fn profile(&self, state: ActivityState) -> &PowerProfile {
        match state {
            ActivityState::Awake => &self.awake,
            ActivityState::LowPower => &self.low_power,
            ActivityState::Sleep => &self.sleep,
        }
    }

    /// State implied by an idle duration
    pub fn classify(&self, idle: Duration) -> ActivityState {
        if idle >= self.sleep_threshold {
            ActivityState::Sleep
        } else if idle >= self.idle_threshold {
            ActivityState::LowPower
        } else {
            ActivityState::Awake
        }
    }

    pub fn validate(&self) -> KioskResult<()> {
        if !self.motion_threshold.is_finite() || self.motion_threshold <= 0.0 {
            return Err(KioskError::Config(format!(
                "motion threshold must be positive, got {}",
                self.motion_threshold
            )));
        }
        if self.idle_threshold.is_zero() || self.idle_threshold >= self.sleep_threshold {
            return Err(KioskError::Config(format!(
                "idle threshold {:?} must be non-zero and below sleep threshold {:?}",
                self.idle_threshold, self.sleep_threshold
            )));
        }
        if self.tick_interval.is_zero() {
            return Err(KioskError::Config("activity tick interval must be non-zero".into()));
        }
        if self.max_sample_gap.is_zero() {
            return Err(KioskError::Config("max sample gap must be non-zero".into()));
        }
        if self.wake_debounce.is_zero() || self.wake_debounce >= self.idle_threshold {
            return Err(KioskError::Config(format!(
                "wake debounce {:?} must be non-zero and below idle threshold {:?}",
                self.wake_debounce, self.idle_threshold
            )));
        }
        Ok(())
    }
}

/// A state change and the side effects it requires
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub from: ActivityState,
    pub to: ActivityState,
    pub at: DeviceTime,
    pub directives: Vec<Directive>,
}

/// Machine counters
#[derive(Clone, Debug, Default)]
pub struct ActivityStats {
    pub samples: u64,
    pub qualifying_samples: u64,
    pub dropped_samples: u64,
    pub transitions: u64,
    /// Wake attempts from Sleep that ended before the debounce window
    pub rejected_wakes: u64,
}

/// Pending wake from Sleep
#[derive(Clone, Copy, Debug)]
struct WakeCandidate {
    since: DeviceTime,
    last: DeviceTime,
}

/// Activity State Machine - sole writer of [`ActivityState`]
pub struct ActivityStateMachine {
    state: ActivityState,
    /// Last accepted activity; never moves backwards
    last_activity: DeviceTime,
    wake_candidate: Option<WakeCandidate>,
    config: ActivityConfig,
    stats: ActivityStats,
}

impl ActivityStateMachine {
    /// Create a machine, Awake as of `now`, with default configuration
    pub fn new(now: DeviceTime) -> Self {
        Self::with_config(ActivityConfig::default(), now)
    }

    /// Create a machine, Awake as of `now`, with custom configuration
    pub fn with_config(config: ActivityConfig, now: DeviceTime) -> Self {
        ActivityStateMachine {
            state: ActivityState::Awake,
            last_activity: now,
            wake_candidate: None,
            config,
            stats: ActivityStats::default(),
        }
    }

    /// Consume one motion sample
    pub fn on_motion_sample(&mut self, sample: &MotionSample) -> Option<Transition> {
        if !sample.user_acceleration.is_finite() {
            self.stats.dropped_samples += 1;
            return None;
        }
        self.stats.samples += 1;
        let now = sample.timestamp;

        if sample.total_acceleration() <= self.config.motion_threshold {
            self.break_wake_candidate();
            return self.evaluate_decay(now);
        }
        self.stats.qualifying_samples += 1;

        match self.state {
            ActivityState::Sleep => self.on_sleeping_activity(now),
            ActivityState::Awake | ActivityState::LowPower => {
                self.record_activity(now);
                self.transition_to(ActivityState::Awake, now)
            }
        }
    }

    /// Periodic decay evaluation
    pub fn tick(&mut self, now: DeviceTime) -> Option<Transition> {
        self.evaluate_decay(now)
    }

    /// Foreground resume: back to Awake with a fresh activity timestamp
    pub fn reset(&mut self, now: DeviceTime) -> Option<Transition> {
        self.wake_candidate = None;
        self.record_activity(now);
        self.transition_to(ActivityState::Awake, now)
    }

    pub fn state(&self) -> ActivityState {
        self.state
    }

    pub fn last_activity(&self) -> DeviceTime {
        self.last_activity
    }

    /// Time since the last accepted activity
    pub fn idle_for(&self, now: DeviceTime) -> Duration {
        now - self.last_activity
    }

    /// Profile currently in force
    pub fn current_profile(&self) -> &PowerProfile {
        self.config.profile(self.state)
    }

    pub fn config(&self) -> &ActivityConfig {
        &self.config
    }

    pub fn stats(&self) -> &ActivityStats {
        &self.stats
    }

    fn on_sleeping_activity(&mut self, now: DeviceTime) -> Option<Transition> {
        let candidate = match self.wake_candidate {
            Some(c) if now - c.last <= self.config.max_sample_gap => WakeCandidate { since: c.since, last: now },
            Some(_) => {
                // Sensor gap: continuity broken, start over from this sample
                self.stats.rejected_wakes += 1;
                WakeCandidate { since: now, last: now }
            }
            None => WakeCandidate { since: now, last: now },
        };

        if now - candidate.since >= self.config.wake_debounce {
            self.wake_candidate = None;
            self.record_activity(now);
            self.transition_to(ActivityState::Awake, now)
        } else {
            self.wake_candidate = Some(candidate);
            None
        }
    }

    fn break_wake_candidate(&mut self) {
        if self.wake_candidate.take().is_some() {
            self.stats.rejected_wakes += 1;
            tracing::debug!("wake candidate rejected: activity not sustained");
        }
    }

    fn record_activity(&mut self, now: DeviceTime) {
        self.last_activity = self.last_activity.max(now);
    }

    /// Decay only ever deepens the state; waking is driven by activity
    fn evaluate_decay(&mut self, now: DeviceTime) -> Option<Transition> {
        let target = self.config.classify(self.idle_for(now));
        if target.is_deeper_than(self.state) {
            self.transition_to(target, now)
        } else {
            None
        }
    }

    /// Idempotent: re-entering the current state fires nothing
    fn transition_to(&mut self, to: ActivityState, at: DeviceTime) -> Option<Transition> {
        let from = self.state;
        if from == to {
            return None;
        }

        let directives = Directive::for_transition(self.config.profile(from), self.config.profile(to));
        self.state = to;
        self.stats.transitions += 1;
        if to != ActivityState::Sleep {
            self.wake_candidate = None;
        }

        tracing::info!(%from, %to, ?at, directives = directives.len(), "activity transition");

        Some(Transition {
            from,
            to,
            at,
            directives,
        })
    }
}
