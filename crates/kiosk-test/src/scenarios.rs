//! End-to-end kiosk scenarios
//!
//! Each scenario drives a full controller through [`KioskHarness`] and
//! reports what the engines did, so the same runs can back tests and
//! manual investigation.

use std::time::Duration;

use kiosk_core::{ActivityState, KioskResult, PlaybackHealth};
use kiosk_runtime::SurfaceState;

use crate::{HarnessConfig, KioskHarness, MotionPattern, SensorNoiseModel};

/// Feed `duration` of `pattern`, starting one sample after the current time
pub fn play(h: &mut KioskHarness, noise: &mut SensorNoiseModel, pattern: MotionPattern, duration: Duration) {
    let start = h.now() + noise.config().sample_interval;
    let samples = noise.stream(pattern, start, duration);
    h.feed(&samples);
}

/// What happened over one simulated visitor cycle
#[derive(Clone, Debug)]
pub struct VisitorDayReport {
    /// State after each phase, in order
    pub phases: Vec<(&'static str, ActivityState)>,
    /// Player calls made while the kiosk slept
    pub player_calls_while_asleep: u64,
    pub transitions: u64,
    pub players_created: u64,
    pub surface_after_wake: SurfaceState,
}

impl VisitorDayReport {
    pub fn states(&self) -> Vec<ActivityState> {
        self.phases.iter().map(|(_, s)| *s).collect()
    }
}

/// An untouched kiosk dims, sleeps, shrugs off a knock and wakes for a visitor
pub fn run_visitor_day(seed: u64) -> KioskResult<VisitorDayReport> {
    let mut h = KioskHarness::new(HarnessConfig::offline())?;
    let mut noise = SensorNoiseModel::with_seed(seed);
    let mut phases = Vec::new();
    h.start();

    play(&mut h, &mut noise, MotionPattern::Still, Duration::from_secs(45));
    phases.push(("idle", h.state()));

    play(&mut h, &mut noise, MotionPattern::Still, Duration::from_secs(30));
    phases.push(("long idle", h.state()));

    let asleep_calls = h.player_ops().player_calls();
    h.monitor.set_health(PlaybackHealth::FAILED);
    play(&mut h, &mut noise, MotionPattern::Still, Duration::from_secs(60));
    play(
        &mut h,
        &mut noise,
        MotionPattern::Bump {
            duration: Duration::from_millis(200),
        },
        Duration::from_secs(1),
    );
    phases.push(("knocked", h.state()));
    let player_calls_while_asleep = h.player_ops().player_calls() - asleep_calls;

    play(&mut h, &mut noise, MotionPattern::Visitor, Duration::from_secs(2));
    h.advance(Duration::from_secs(15));
    phases.push(("visitor", h.state()));

    Ok(VisitorDayReport {
        phases,
        player_calls_while_asleep,
        transitions: h.stats().transitions,
        players_created: h.player_ops().created,
        surface_after_wake: h.surface(),
    })
}
