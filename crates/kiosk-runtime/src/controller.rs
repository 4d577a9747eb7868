//! Kiosk Controller - single writer of all runtime state
//!
//! Every input (motion samples, health ticks, lifecycle events, pipeline
//! notices) reaches the engines through this type, on one task. Engines
//! return directives; the controller applies them to the render surface
//! and the watchdog.

use std::sync::Arc;

use kiosk_core::{ActivityState, CameraOrientation, Clock, DeviceTime, Directive, KioskResult, MotionSample};
use kiosk_playback::{PlaybackWatchdog, WatchdogAction};
use kiosk_sensor::{ActivityStateMachine, OrientationTracker, Transition};
use kiosk_update::{PipelineEvent, UpdateOutcome, UpdatePipeline};

use crate::RenderSurface;

#[derive(Clone, Debug, Default)]
pub struct ControllerStats {
    pub samples: u64,
    pub dropped_samples: u64,
    pub transitions: u64,
    pub orientation_updates: u64,
    pub health_ticks: u64,
    pub watchdog_repairs: u64,
    pub update_checks: u64,
    pub updates_installed: u64,
    pub update_failures: u64,
}

/// Kiosk Controller
pub struct Controller {
    clock: Arc<dyn Clock>,
    tracker: OrientationTracker,
    activity: ActivityStateMachine,
    watchdog: PlaybackWatchdog,
    surface: Box<dyn RenderSurface>,
    pipeline: Option<Arc<UpdatePipeline>>,
    field_of_view: f64,
    stats: ControllerStats,
}

impl Controller {
    pub fn new(
        clock: Arc<dyn Clock>,
        tracker: OrientationTracker,
        activity: ActivityStateMachine,
        watchdog: PlaybackWatchdog,
        surface: Box<dyn RenderSurface>,
        pipeline: Option<Arc<UpdatePipeline>>,
        field_of_view: f64,
    ) -> Self {
        Controller {
            clock,
            tracker,
            activity,
            watchdog,
            surface,
            pipeline,
            field_of_view,
            stats: ControllerStats::default(),
        }
    }

    /// Bring the display up: current profile, field of view, first player
    pub fn start(&mut self) -> WatchdogAction {
        let profile = *self.activity.current_profile();
        self.surface.set_brightness(profile.brightness);
        self.surface.set_frame_rate_cap(profile.max_frame_rate);
        self.surface.set_hidden(profile.surface_hidden);
        self.surface.set_field_of_view(self.field_of_view);
        if let Err(e) = self.watchdog.set_paused(profile.playback_paused) {
            tracing::warn!(error = %e, "initial playback state");
        }
        tracing::info!(state = %self.activity.state(), fov = self.field_of_view, "controller started");
        self.health_tick()
    }

    pub fn on_motion_sample(&mut self, sample: &MotionSample) {
        self.stats.samples += 1;
        if !sample.is_finite() {
            self.stats.dropped_samples += 1;
            return;
        }

        if let Some(transition) = self.activity.on_motion_sample(sample) {
            self.apply_transition(transition);
        }

        if self.activity.state().applies_orientation() {
            if let Some(orientation) = self.tracker.on_motion_sample(sample) {
                self.apply(Directive::ApplyOrientation(orientation));
            }
        }
    }

    /// Coarse periodic pass: activity decay, then playback health
    pub fn health_tick(&mut self) -> WatchdogAction {
        let now = self.clock.now();
        self.stats.health_ticks += 1;

        if let Some(transition) = self.activity.tick(now) {
            self.apply_transition(transition);
        }

        let action = self.watchdog.tick(now, self.activity.state());
        if action.is_repair() {
            self.stats.watchdog_repairs += 1;
        }
        action
    }

    /// Run a rebuild whose settle delay has passed
    pub fn recreate_if_due(&mut self) -> Option<WatchdogAction> {
        let action = self.watchdog.recreate_if_due(self.clock.now(), self.activity.state())?;
        if action.is_repair() {
            self.stats.watchdog_repairs += 1;
        }
        Some(action)
    }

    /// When a pending rebuild becomes due
    pub fn recreate_deadline(&self) -> Option<DeviceTime> {
        self.watchdog.next_deadline()
    }

    pub fn on_end_of_media(&mut self) {
        self.watchdog.on_end_of_media(self.activity.state());
    }

    /// Loop playback if the player finished without telling anyone
    pub fn poll_end_of_media(&mut self) -> bool {
        self.watchdog.poll_end_of_media(self.activity.state())
    }

    /// App returned to the foreground: new forward reference, fully awake
    pub fn on_foreground(&mut self) {
        self.tracker.recalibrate();
        if let Some(transition) = self.activity.reset(self.clock.now()) {
            self.apply_transition(transition);
        }
    }

    /// One-time override from the presentation layer
    pub fn override_field_of_view(&mut self, fov: f64) -> KioskResult<()> {
        let applied = match &self.pipeline {
            Some(pipeline) => pipeline.override_field_of_view(fov)?,
            None => {
                if !fov.is_finite() {
                    return Err(kiosk_core::KioskError::Config(format!("field of view {}", fov)));
                }
                kiosk_update::clamp_field_of_view(fov)
            }
        };
        self.apply(Directive::SetFieldOfView(applied));
        Ok(())
    }

    pub fn on_pipeline_event(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::FieldOfView(fov) => self.apply(Directive::SetFieldOfView(fov)),
            PipelineEvent::ContentChanged { version, path } => {
                self.stats.updates_installed += 1;
                tracing::info!(%version, path = %path.display(), "content changed, rebuilding player");
                self.watchdog.on_content_changed(self.clock.now(), self.activity.state());
            }
            PipelineEvent::CheckFinished(outcome) => {
                self.stats.update_checks += 1;
                if let UpdateOutcome::Failed(_) = outcome {
                    self.stats.update_failures += 1;
                }
            }
        }
    }

    pub fn apply(&mut self, directive: Directive) {
        match directive {
            Directive::SetBrightness(b) => self.surface.set_brightness(b),
            Directive::SetFrameRateCap(fps) => self.surface.set_frame_rate_cap(fps),
            Directive::SetSurfaceHidden(hidden) => self.surface.set_hidden(hidden),
            Directive::PausePlayback | Directive::ResumePlayback => {
                if let Err(e) = self.watchdog.set_paused(directive == Directive::PausePlayback) {
                    // The watchdog repairs it on a later tick
                    tracing::warn!(error = %e, ?directive, "playback directive failed");
                }
            }
            Directive::ApplyOrientation(orientation) => {
                self.stats.orientation_updates += 1;
                self.surface.set_orientation(orientation);
            }
            Directive::SetFieldOfView(fov) => {
                self.field_of_view = fov;
                self.surface.set_field_of_view(fov);
            }
        }
    }

    /// Device time as the controller sees it
    pub fn now(&self) -> DeviceTime {
        self.clock.now()
    }

    pub fn activity_state(&self) -> ActivityState {
        self.activity.state()
    }

    pub fn orientation(&self) -> CameraOrientation {
        let state = self.tracker.state();
        CameraOrientation {
            yaw: state.current_yaw,
            pitch: state.current_pitch,
        }
    }

    pub fn field_of_view(&self) -> f64 {
        self.field_of_view
    }

    pub fn pipeline(&self) -> Option<&Arc<UpdatePipeline>> {
        self.pipeline.as_ref()
    }

    pub fn watchdog(&self) -> &PlaybackWatchdog {
        &self.watchdog
    }

    pub fn stats(&self) -> &ControllerStats {
        &self.stats
    }

    fn apply_transition(&mut self, transition: Transition) {
        self.stats.transitions += 1;
        for directive in transition.directives {
            self.apply(directive);
        }
    }
}
