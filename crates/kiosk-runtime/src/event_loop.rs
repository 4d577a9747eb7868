//! Cooperative event loop
//!
//! One task owns the [`Controller`]. Sensor datagrams, the health tick,
//! the settle timer, the end-of-media poll and pipeline notices are
//! multiplexed with `select!` so every state change happens on this task.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use kiosk_core::MotionSample;
use kiosk_update::PipelineEvent;

use crate::{Controller, ControllerStats};

/// Inputs from outside the controller
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    Motion(MotionSample),
    /// The kiosk app came back to the foreground
    Foreground,
    /// The player reached the end of the media
    EndOfMedia,
    /// Presentation-layer field of view override (degrees)
    FieldOfView(f64),
    Shutdown,
}

impl Controller {
    /// Dispatch one external event. `Shutdown` is handled by the loop.
    pub fn on_event(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::Motion(sample) => self.on_motion_sample(&sample),
            ControllerEvent::Foreground => self.on_foreground(),
            ControllerEvent::EndOfMedia => self.on_end_of_media(),
            ControllerEvent::FieldOfView(fov) => {
                if let Err(e) = self.override_field_of_view(fov) {
                    tracing::warn!(error = %e, "field of view override rejected");
                }
            }
            ControllerEvent::Shutdown => {}
        }
    }
}

async fn sleep_or_never(delay: Option<Duration>) {
    match delay {
        Some(delay) => tokio::time::sleep(delay).await,
        None => std::future::pending().await,
    }
}

/// Drive the controller until `shutdown` resolves, the event channel
/// closes or a `Shutdown` event arrives
pub async fn run_event_loop(
    mut controller: Controller,
    health_interval: Duration,
    mut events: mpsc::Receiver<ControllerEvent>,
    mut pipeline_events: mpsc::UnboundedReceiver<PipelineEvent>,
    shutdown: impl Future<Output = ()>,
) -> ControllerStats {
    tokio::pin!(shutdown);

    let start = controller.start();
    tracing::debug!(?start, "initial playback pass");

    let mut health = tokio::time::interval_at(tokio::time::Instant::now() + health_interval, health_interval);
    health.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let end_poll_interval = controller.watchdog().config().end_poll_interval.max(Duration::from_millis(1));
    let mut end_poll = tokio::time::interval(end_poll_interval);
    end_poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // Asleep, a pending rebuild waits for the wake-up tick
        let recreate_in = controller
            .recreate_deadline()
            .filter(|_| !controller.activity_state().is_asleep())
            .map(|due| due - controller.now());

        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutdown requested");
                break;
            }
            _ = health.tick() => {
                let action = controller.health_tick();
                tracing::debug!(?action, state = %controller.activity_state(), "health tick");
            }
            _ = end_poll.tick() => {
                if controller.poll_end_of_media() {
                    tracing::debug!("media finished, looped to start");
                }
            }
            _ = sleep_or_never(recreate_in) => {
                if let Some(action) = controller.recreate_if_due() {
                    tracing::debug!(?action, "settle timer");
                }
            }
            event = events.recv() => match event {
                Some(ControllerEvent::Shutdown) | None => {
                    tracing::info!("event source closed");
                    break;
                }
                Some(event) => controller.on_event(event),
            },
            Some(event) = pipeline_events.recv() => controller.on_pipeline_event(event),
        }
    }

    let stats = controller.stats().clone();
    tracing::info!(?stats, "controller stopped");
    stats
}
