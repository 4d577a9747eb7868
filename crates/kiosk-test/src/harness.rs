//! Controller harness on a manual clock
//!
//! Builds a full [`Controller`] with fake collaborators and drives its
//! timers deterministically: health ticks fire every `health_interval`
//! of device time and pending rebuilds fire at their deadline.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;

use kiosk_core::{
    ActivityState, AssetLayout, AssetVersion, Clock, DeviceTime, KioskError, KioskResult, ManualClock, MediaLock,
    MotionSample,
};
use kiosk_playback::{PlaybackWatchdog, WatchdogAction, WatchdogConfig};
use kiosk_runtime::{Controller, ControllerStats, LoggingSurface, SurfaceState};
use kiosk_sensor::{ActivityConfig, ActivityStateMachine, OrientationTracker};
use kiosk_update::{
    sha256_hex, PipelineEvent, UpdateConfig, UpdateOutcome, UpdatePipeline, VersionStore, DEFAULT_FIELD_OF_VIEW,
};

use crate::{FakeFactory, FakeFetcher, PlayerOps, PlayerMonitor};

/// Bytes of the bundled fallback asset
pub const BUNDLED_ASSET: &[u8] = b"bundled panorama";

/// Harness options
#[derive(Clone, Debug)]
pub struct HarnessConfig {
    /// Attach an update pipeline backed by a [`FakeFetcher`]
    pub updates: bool,
    pub baseline_version: String,
    /// Asset already installed before start-up: version token and bytes
    pub installed: Option<(String, Vec<u8>)>,
    pub activity: ActivityConfig,
    pub watchdog: WatchdogConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            updates: true,
            baseline_version: "0".into(),
            installed: None,
            activity: ActivityConfig::default(),
            watchdog: WatchdogConfig::default(),
        }
    }
}

impl HarnessConfig {
    pub fn offline() -> Self {
        Self {
            updates: false,
            ..Default::default()
        }
    }
}

/// One update check as the controller saw it
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateCheck {
    pub outcome: UpdateOutcome,
    /// Notices delivered to the controller, in order
    pub events: Vec<PipelineEvent>,
}

impl UpdateCheck {
    pub fn content_changes(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, PipelineEvent::ContentChanged { .. }))
            .count()
    }
}

/// A controller wired to fakes
pub struct KioskHarness {
    pub clock: Arc<ManualClock>,
    pub controller: Controller,
    pub surface: LoggingSurface,
    pub monitor: PlayerMonitor,
    pub fetcher: FakeFetcher,
    pub layout: AssetLayout,
    pub media_lock: MediaLock,
    pipeline_events: Option<mpsc::UnboundedReceiver<PipelineEvent>>,
    health_interval: Duration,
    next_health: DeviceTime,
    _dir: TempDir,
}

impl KioskHarness {
    pub fn new(config: HarnessConfig) -> KioskResult<Self> {
        let dir = tempfile::tempdir()?;
        let fallback = dir.path().join("bundled.mp4");
        std::fs::write(&fallback, BUNDLED_ASSET)?;
        let layout = AssetLayout::new(dir.path().join("assets"), fallback);
        layout.ensure_dir()?;
        if let Some((version, bytes)) = &config.installed {
            install_asset(&layout, version, bytes)?;
        }

        let clock = Arc::new(ManualClock::new());
        let media_lock = MediaLock::new();
        let monitor = PlayerMonitor::new();
        let fetcher = FakeFetcher::new();
        let surface = LoggingSurface::new();

        let (pipeline, pipeline_events) = if config.updates {
            let (tx, rx) = mpsc::unbounded_channel();
            let update = UpdateConfig {
                manifest_url: "https://cdn.example/kiosk/manifest.json".into(),
                baseline_version: AssetVersion::parse(&config.baseline_version).unwrap_or_else(|| AssetVersion::from(0)),
                ..Default::default()
            };
            let pipeline = UpdatePipeline::new(update, layout.clone(), Arc::new(fetcher.clone()), media_lock.clone(), tx)?;
            (Some(Arc::new(pipeline)), Some(rx))
        } else {
            (None, None)
        };

        let field_of_view = pipeline
            .as_ref()
            .map(|p| p.field_of_view())
            .unwrap_or(DEFAULT_FIELD_OF_VIEW);
        let health_interval = config.activity.tick_interval.min(config.watchdog.tick_interval);
        let watchdog = PlaybackWatchdog::with_config(
            config.watchdog,
            layout.clone(),
            FakeFactory::new(monitor.clone()),
            media_lock.clone(),
        );

        let controller = Controller::new(
            clock.clone(),
            OrientationTracker::new(),
            ActivityStateMachine::with_config(config.activity, clock.now()),
            watchdog,
            Box::new(surface.clone()),
            pipeline,
            field_of_view,
        );

        Ok(KioskHarness {
            next_health: clock.now() + health_interval,
            clock,
            controller,
            surface,
            monitor,
            fetcher,
            layout,
            media_lock,
            pipeline_events,
            health_interval,
            _dir: dir,
        })
    }

    /// Initial profile and first player
    pub fn start(&mut self) -> WatchdogAction {
        self.controller.start()
    }

    pub fn now(&self) -> DeviceTime {
        self.clock.now()
    }

    /// Let device time pass, firing every timer that falls due
    pub fn advance(&mut self, dt: Duration) {
        let target = self.now() + dt;
        self.run_timers_until(target);
    }

    /// Deliver samples in timestamp order, firing timers in between
    pub fn feed(&mut self, samples: &[MotionSample]) {
        for sample in samples {
            self.run_timers_until(sample.timestamp);
            self.controller.on_motion_sample(sample);
        }
    }

    /// Run one update check and deliver what it announced
    pub async fn check_for_update(&mut self) -> UpdateCheck {
        let Some(pipeline) = self.controller.pipeline().cloned() else {
            return UpdateCheck {
                outcome: UpdateOutcome::NoChange,
                events: Vec::new(),
            };
        };
        let outcome = pipeline.check_and_update().await;
        let events = self.deliver_pipeline_events();
        self.controller
            .on_pipeline_event(PipelineEvent::CheckFinished(outcome.clone()));
        UpdateCheck { outcome, events }
    }

    /// Installed version token as persisted on disk
    pub fn persisted_version(&self) -> Option<AssetVersion> {
        VersionStore::open(self.layout.record_path())
            .ok()
            .and_then(|store| store.installed_version().cloned())
    }

    /// Hand queued pipeline notices to the controller
    pub fn deliver_pipeline_events(&mut self) -> Vec<PipelineEvent> {
        let mut delivered = Vec::new();
        if let Some(rx) = self.pipeline_events.as_mut() {
            while let Ok(event) = rx.try_recv() {
                delivered.push(event.clone());
                self.controller.on_pipeline_event(event);
            }
        }
        delivered
    }

    pub fn state(&self) -> ActivityState {
        self.controller.activity_state()
    }

    pub fn surface(&self) -> SurfaceState {
        self.surface.state()
    }

    pub fn player_ops(&self) -> PlayerOps {
        self.monitor.ops()
    }

    pub fn stats(&self) -> &ControllerStats {
        self.controller.stats()
    }

    fn run_timers_until(&mut self, target: DeviceTime) {
        loop {
            // Asleep, a pending rebuild waits for the wake-up tick
            let recreate = self
                .controller
                .recreate_deadline()
                .filter(|_| !self.controller.activity_state().is_asleep());
            let next = match recreate {
                Some(due) if due < self.next_health => due,
                _ => self.next_health,
            };
            if next > target {
                break;
            }
            self.clock.set(next);
            if recreate == Some(next) {
                self.controller.recreate_if_due();
            } else {
                self.controller.health_tick();
                self.next_health = next + self.health_interval;
            }
        }
        self.clock.set(target);
    }
}

/// Place `bytes` as the canonical asset and record `version` for it
pub fn install_asset(layout: &AssetLayout, version: &str, bytes: &[u8]) -> KioskResult<()> {
    let version = AssetVersion::parse(version).ok_or(KioskError::MissingField("version"))?;
    layout.ensure_dir()?;
    std::fs::write(layout.canonical_path(), bytes)?;
    let mut store = VersionStore::open(layout.record_path())?;
    store.begin_install(version, sha256_hex(bytes))?;
    store.commit_install()?;
    Ok(())
}
