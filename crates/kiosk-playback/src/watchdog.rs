//! Playback Watchdog - keeps something on screen
//!
//! The watchdog owns the live playback resource. On every tick it samples
//! health and repairs what it finds, in this order:
//!
//! 1. asleep: nothing, not even a health sample
//! 2. no resource: build one (canonical asset, bundled fallback otherwise)
//! 3. failed: tear down, rebuild after the settle delay
//! 4. not playing: resume
//!
//! A failed resource also reports not-playing, so failure is checked
//! before the stall.

use std::path::{Path, PathBuf};
use std::time::Duration;

use kiosk_core::{ActivityState, AssetLayout, DeviceTime, KioskError, KioskResult, MediaLock};

use crate::{MediaPlayer, PlayerFactory};

/// Watchdog configuration
#[derive(Clone, Debug)]
pub struct WatchdogConfig {
    /// Health tick interval
    pub tick_interval: Duration,
    /// Delay between teardown and rebuild
    pub settle_delay: Duration,
    /// How often a player is asked whether it finished its media
    pub end_poll_interval: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        WatchdogConfig {
            tick_interval: Duration::from_secs(10),
            settle_delay: Duration::from_secs(1),
            end_poll_interval: Duration::from_millis(250),
        }
    }
}

impl WatchdogConfig {
    pub fn validate(&self) -> KioskResult<()> {
        if self.tick_interval.is_zero() {
            return Err(KioskError::Config("watchdog tick interval must be non-zero".into()));
        }
        if self.end_poll_interval.is_zero() {
            return Err(KioskError::Config("end of media poll interval must be non-zero".into()));
        }
        if self.settle_delay >= self.tick_interval {
            return Err(KioskError::Config(format!(
                "settle delay {:?} must be shorter than the tick interval {:?}",
                self.settle_delay, self.tick_interval
            )));
        }
        Ok(())
    }
}

/// What a watchdog pass did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WatchdogAction {
    /// Asleep; the resource was not touched
    Skipped,
    Healthy,
    /// Stalled, but the power profile wants it paused
    HeldPaused,
    Created { source: PathBuf },
    Resumed,
    TornDown { retry_at: DeviceTime },
    /// Waiting out the settle delay
    Settling { until: DeviceTime },
    Recreated { source: PathBuf },
    /// The asset is being installed; retried next pass
    Deferred,
    CreateFailed(String),
}

impl WatchdogAction {
    /// Did this pass repair a broken resource?
    pub fn is_repair(&self) -> bool {
        matches!(
            self,
            WatchdogAction::Resumed | WatchdogAction::TornDown { .. } | WatchdogAction::Recreated { .. }
        )
    }
}

#[derive(Clone, Debug, Default)]
pub struct WatchdogStats {
    pub ticks: u64,
    pub skipped: u64,
    pub creations: u64,
    pub resumes: u64,
    pub teardowns: u64,
    pub recreations: u64,
    pub deferrals: u64,
    pub create_failures: u64,
    pub fallbacks: u64,
    pub loops: u64,
}

/// Playback Watchdog - sole owner of the live playback resource
pub struct PlaybackWatchdog {
    player: Option<Box<dyn MediaPlayer>>,
    factory: Box<dyn PlayerFactory>,
    layout: AssetLayout,
    media_lock: MediaLock,
    config: WatchdogConfig,
    /// Pending rebuild after a teardown
    recreate_at: Option<DeviceTime>,
    /// Content changed while asleep; rebuild on the first waking pass
    content_stale: bool,
    /// Power profile pause in force
    held_paused: bool,
    stats: WatchdogStats,
}

impl PlaybackWatchdog {
    pub fn new(layout: AssetLayout, factory: impl PlayerFactory + 'static, media_lock: MediaLock) -> Self {
        Self::with_config(WatchdogConfig::default(), layout, factory, media_lock)
    }

    pub fn with_config(
        config: WatchdogConfig,
        layout: AssetLayout,
        factory: impl PlayerFactory + 'static,
        media_lock: MediaLock,
    ) -> Self {
        PlaybackWatchdog {
            player: None,
            factory: Box::new(factory),
            layout,
            media_lock,
            config,
            recreate_at: None,
            content_stale: false,
            held_paused: false,
            stats: WatchdogStats::default(),
        }
    }

    /// Periodic health pass
    pub fn tick(&mut self, now: DeviceTime, activity: ActivityState) -> WatchdogAction {
        self.stats.ticks += 1;
        if activity.is_asleep() {
            self.stats.skipped += 1;
            return WatchdogAction::Skipped;
        }

        if self.content_stale {
            self.content_stale = false;
            return self.teardown(now, "asset replaced");
        }

        if let Some(due) = self.recreate_at {
            return if now >= due {
                self.build(now, true)
            } else {
                WatchdogAction::Settling { until: due }
            };
        }

        let Some(player) = self.player.as_mut() else {
            return self.build(now, false);
        };

        let health = player.health();
        if health.has_failed {
            return self.teardown(now, "playback failed");
        }
        if self.held_paused {
            return WatchdogAction::HeldPaused;
        }
        if !health.is_playing {
            return match player.resume() {
                Ok(()) => {
                    self.stats.resumes += 1;
                    tracing::warn!(source = %player.source().display(), "playback stalled, resumed");
                    WatchdogAction::Resumed
                }
                Err(e) => {
                    tracing::warn!(error = %e, "resume failed");
                    self.teardown(now, "resume failed")
                }
            };
        }
        WatchdogAction::Healthy
    }

    /// Run a pending rebuild whose settle delay has elapsed
    pub fn recreate_if_due(&mut self, now: DeviceTime, activity: ActivityState) -> Option<WatchdogAction> {
        let due = self.recreate_at?;
        if activity.is_asleep() || now < due {
            return None;
        }
        Some(self.build(now, true))
    }

    /// End-of-media: loop back to the start
    pub fn on_end_of_media(&mut self, activity: ActivityState) -> bool {
        if activity.is_asleep() || self.held_paused {
            return false;
        }
        let Some(player) = self.player.as_mut() else {
            return false;
        };
        match player.seek_to_start().and_then(|()| player.resume()) {
            Ok(()) => {
                self.stats.loops += 1;
                true
            }
            Err(e) => {
                // Next tick repairs it
                tracing::warn!(error = %e, "loop restart failed");
                false
            }
        }
    }

    /// Loop a player that finished its media without an end-of-media event.
    /// Asleep, paused or settling players are left alone.
    pub fn poll_end_of_media(&mut self, activity: ActivityState) -> bool {
        if activity.is_asleep() || self.held_paused || self.recreate_at.is_some() {
            return false;
        }
        if !self.player.as_mut().is_some_and(|p| p.reached_end()) {
            return false;
        }
        tracing::debug!("player reached end of media");
        self.on_end_of_media(activity)
    }

    /// The canonical asset was replaced: rebuild against the new file
    pub fn on_content_changed(&mut self, now: DeviceTime, activity: ActivityState) -> WatchdogAction {
        if activity.is_asleep() {
            self.content_stale = true;
            return WatchdogAction::Skipped;
        }
        self.content_stale = false;
        self.teardown(now, "asset replaced")
    }

    /// Apply a power profile pause or resume
    pub fn set_paused(&mut self, paused: bool) -> KioskResult<()> {
        self.held_paused = paused;
        match self.player.as_mut() {
            Some(player) if paused => player.pause(),
            Some(player) => player.resume(),
            None => Ok(()),
        }
    }

    pub fn has_player(&self) -> bool {
        self.player.is_some()
    }

    pub fn player_source(&self) -> Option<&Path> {
        self.player.as_ref().map(|p| p.source())
    }

    /// When the pending rebuild becomes due, if any
    pub fn next_deadline(&self) -> Option<DeviceTime> {
        self.recreate_at
    }

    pub fn is_paused(&self) -> bool {
        self.held_paused
    }

    pub fn config(&self) -> &WatchdogConfig {
        &self.config
    }

    pub fn stats(&self) -> &WatchdogStats {
        &self.stats
    }

    fn teardown(&mut self, now: DeviceTime, reason: &str) -> WatchdogAction {
        let source = self.player.take().map(|p| p.source().display().to_string());
        let retry_at = now + self.config.settle_delay;
        self.recreate_at = Some(retry_at);
        self.stats.teardowns += 1;
        tracing::warn!(reason, source = ?source, ?retry_at, "playback resource torn down");
        WatchdogAction::TornDown { retry_at }
    }

    fn build(&mut self, now: DeviceTime, recreate: bool) -> WatchdogAction {
        let lock = self.media_lock.clone();
        let Some(_guard) = lock.try_lock() else {
            self.stats.deferrals += 1;
            if self.recreate_at.is_some() {
                self.recreate_at = Some(now + self.config.settle_delay);
            }
            tracing::debug!("asset busy, deferring player creation");
            return WatchdogAction::Deferred;
        };

        match self.create_with_fallback() {
            Ok(mut player) => {
                if !self.held_paused {
                    if let Err(e) = player.resume() {
                        tracing::warn!(error = %e, "new player did not start");
                    }
                }
                let source = player.source().to_path_buf();
                self.player = Some(player);
                self.recreate_at = None;
                if recreate {
                    self.stats.recreations += 1;
                    tracing::warn!(source = %source.display(), "playback resource recreated");
                    WatchdogAction::Recreated { source }
                } else {
                    self.stats.creations += 1;
                    tracing::info!(source = %source.display(), "playback resource created");
                    WatchdogAction::Created { source }
                }
            }
            Err(e) => {
                self.stats.create_failures += 1;
                self.recreate_at = None;
                tracing::warn!(error = %e, "could not create playback resource");
                WatchdogAction::CreateFailed(e.to_string())
            }
        }
    }

    /// Canonical asset first, bundled fallback if that fails
    fn create_with_fallback(&mut self) -> KioskResult<Box<dyn MediaPlayer>> {
        let source = self.layout.playable_source();
        match self.factory.create(&source) {
            Ok(player) => Ok(player),
            Err(e) if source != self.layout.fallback_path() => {
                tracing::warn!(error = %e, source = %source.display(), "falling back to bundled asset");
                self.stats.fallbacks += 1;
                self.factory.create(self.layout.fallback_path())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use kiosk_core::PlaybackHealth;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Script {
        health: PlaybackHealth,
        ops: Vec<&'static str>,
        created: Vec<PathBuf>,
        broken_sources: Vec<PathBuf>,
        ended: bool,
    }

    type Shared = Arc<Mutex<Script>>;

    struct ScriptedPlayer {
        script: Shared,
        source: PathBuf,
    }

    impl MediaPlayer for ScriptedPlayer {
        fn health(&mut self) -> PlaybackHealth {
            let mut s = self.script.lock();
            s.ops.push("health");
            s.health
        }

        fn resume(&mut self) -> KioskResult<()> {
            let mut s = self.script.lock();
            s.ops.push("resume");
            s.health.is_playing = true;
            Ok(())
        }

        fn pause(&mut self) -> KioskResult<()> {
            let mut s = self.script.lock();
            s.ops.push("pause");
            s.health.is_playing = false;
            Ok(())
        }

        fn seek_to_start(&mut self) -> KioskResult<()> {
            self.script.lock().ops.push("seek");
            Ok(())
        }

        fn reached_end(&mut self) -> bool {
            std::mem::take(&mut self.script.lock().ended)
        }

        fn source(&self) -> &Path {
            &self.source
        }
    }

    fn factory(script: Shared) -> impl PlayerFactory {
        move |source: &Path| -> KioskResult<Box<dyn MediaPlayer>> {
            let mut s = script.lock();
            if s.broken_sources.iter().any(|b| b == source) {
                return Err(KioskError::Playback(format!("cannot open {}", source.display())));
            }
            s.created.push(source.to_path_buf());
            s.health = PlaybackHealth::STALLED;
            Ok(Box::new(ScriptedPlayer {
                script: script.clone(),
                source: source.to_path_buf(),
            }))
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        layout: AssetLayout,
        script: Shared,
        lock: MediaLock,
        watchdog: PlaybackWatchdog,
    }

    fn fixture(with_canonical: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let layout = AssetLayout::new(dir.path(), dir.path().join("bundled.mp4"));
        if with_canonical {
            std::fs::write(layout.canonical_path(), b"panorama").unwrap();
        }
        let script: Shared = Arc::default();
        let lock = MediaLock::new();
        let watchdog = PlaybackWatchdog::new(layout.clone(), factory(script.clone()), lock.clone());
        Fixture {
            _dir: dir,
            layout,
            script,
            lock,
            watchdog,
        }
    }

    const AWAKE: ActivityState = ActivityState::Awake;

    #[test]
    fn test_creates_from_canonical_asset() {
        let mut f = fixture(true);
        let action = f.watchdog.tick(DeviceTime::ZERO, AWAKE);
        assert_eq!(
            action,
            WatchdogAction::Created {
                source: f.layout.canonical_path()
            }
        );
        assert_eq!(f.script.lock().ops, vec!["resume"]);
        assert_eq!(f.watchdog.tick(DeviceTime::from_secs(10), AWAKE), WatchdogAction::Healthy);
    }

    #[test]
    fn test_first_run_uses_bundled_fallback() {
        let mut f = fixture(false);
        f.watchdog.tick(DeviceTime::ZERO, AWAKE);
        assert_eq!(f.watchdog.player_source(), Some(f.layout.fallback_path()));
    }

    #[test]
    fn test_broken_canonical_falls_back_in_same_tick() {
        let mut f = fixture(true);
        f.script.lock().broken_sources.push(f.layout.canonical_path());

        let action = f.watchdog.tick(DeviceTime::ZERO, AWAKE);
        assert_eq!(
            action,
            WatchdogAction::Created {
                source: f.layout.fallback.clone()
            }
        );
        assert_eq!(f.watchdog.stats().fallbacks, 1);
    }

    #[test]
    fn test_sleep_never_touches_player() {
        let mut f = fixture(true);
        f.watchdog.tick(DeviceTime::ZERO, AWAKE);
        f.script.lock().ops.clear();

        for health in [PlaybackHealth::FAILED, PlaybackHealth::STALLED, PlaybackHealth::PLAYING] {
            f.script.lock().health = health;
            let action = f.watchdog.tick(DeviceTime::from_secs(70), ActivityState::Sleep);
            assert_eq!(action, WatchdogAction::Skipped);
        }
        assert!(f.script.lock().ops.is_empty());
        assert!(f.watchdog.has_player());
    }

    #[test]
    fn test_stall_is_resumed() {
        let mut f = fixture(true);
        f.watchdog.tick(DeviceTime::ZERO, AWAKE);
        f.script.lock().health = PlaybackHealth::STALLED;

        assert_eq!(f.watchdog.tick(DeviceTime::from_secs(10), AWAKE), WatchdogAction::Resumed);
        assert_eq!(f.watchdog.stats().resumes, 1);
    }

    #[test]
    fn test_failure_recreates_after_settle_delay() {
        let mut f = fixture(true);
        f.watchdog.tick(DeviceTime::ZERO, AWAKE);
        f.script.lock().health = PlaybackHealth::FAILED;
        f.script.lock().ops.clear();

        let action = f.watchdog.tick(DeviceTime::from_secs(10), AWAKE);
        let retry_at = DeviceTime::from_secs(11);
        assert_eq!(action, WatchdogAction::TornDown { retry_at });
        // Failed resource is never resumed
        assert_eq!(f.script.lock().ops, vec!["health"]);
        assert!(!f.watchdog.has_player());

        assert!(f.watchdog.recreate_if_due(DeviceTime::from_millis(10_500), AWAKE).is_none());
        let action = f.watchdog.recreate_if_due(retry_at, AWAKE).unwrap();
        assert!(matches!(action, WatchdogAction::Recreated { .. }));
        assert_eq!(f.script.lock().created.len(), 2);
        assert_eq!(f.watchdog.next_deadline(), None);
    }

    #[test]
    fn test_tick_during_settle_waits() {
        let mut f = fixture(true);
        f.watchdog.tick(DeviceTime::ZERO, AWAKE);
        f.watchdog.on_content_changed(DeviceTime::from_secs(5), AWAKE);

        let action = f.watchdog.tick(DeviceTime::from_millis(5_200), AWAKE);
        assert_eq!(
            action,
            WatchdogAction::Settling {
                until: DeviceTime::from_secs(6)
            }
        );
        assert!(matches!(
            f.watchdog.tick(DeviceTime::from_secs(6), AWAKE),
            WatchdogAction::Recreated { .. }
        ));
    }

    #[test]
    fn test_install_in_progress_defers_creation() {
        let mut f = fixture(true);
        let guard = f.lock.lock();
        assert_eq!(f.watchdog.tick(DeviceTime::ZERO, AWAKE), WatchdogAction::Deferred);
        drop(guard);
        assert!(matches!(
            f.watchdog.tick(DeviceTime::from_secs(10), AWAKE),
            WatchdogAction::Created { .. }
        ));
    }

    #[test]
    fn test_deferred_rebuild_waits_another_settle_delay() {
        let mut f = fixture(true);
        f.watchdog.tick(DeviceTime::ZERO, AWAKE);
        f.watchdog.on_content_changed(DeviceTime::from_secs(10), AWAKE);

        let guard = f.lock.lock();
        assert_eq!(
            f.watchdog.recreate_if_due(DeviceTime::from_secs(11), AWAKE),
            Some(WatchdogAction::Deferred)
        );
        assert_eq!(f.watchdog.next_deadline(), Some(DeviceTime::from_secs(12)));
        drop(guard);

        assert!(matches!(
            f.watchdog.recreate_if_due(DeviceTime::from_secs(12), AWAKE),
            Some(WatchdogAction::Recreated { .. })
        ));
    }

    #[test]
    fn test_content_change_while_asleep_waits_for_wake() {
        let mut f = fixture(true);
        f.watchdog.tick(DeviceTime::ZERO, AWAKE);
        f.script.lock().ops.clear();

        let action = f.watchdog.on_content_changed(DeviceTime::from_secs(100), ActivityState::Sleep);
        assert_eq!(action, WatchdogAction::Skipped);
        assert!(f.script.lock().ops.is_empty());
        assert!(f.watchdog.has_player());

        let action = f.watchdog.tick(DeviceTime::from_secs(200), AWAKE);
        assert!(matches!(action, WatchdogAction::TornDown { .. }));
    }

    #[test]
    fn test_end_of_media_loops() {
        let mut f = fixture(true);
        f.watchdog.tick(DeviceTime::ZERO, AWAKE);
        f.script.lock().ops.clear();

        assert!(f.watchdog.on_end_of_media(AWAKE));
        assert_eq!(f.script.lock().ops, vec!["seek", "resume"]);
        assert!(!f.watchdog.on_end_of_media(ActivityState::Sleep));
    }

    #[test]
    fn test_finished_player_loops_on_poll() {
        let mut f = fixture(true);
        f.watchdog.tick(DeviceTime::ZERO, AWAKE);
        assert!(!f.watchdog.poll_end_of_media(AWAKE));
        f.script.lock().ops.clear();

        f.script.lock().ended = true;
        assert!(f.watchdog.poll_end_of_media(AWAKE));
        assert_eq!(f.script.lock().ops, vec!["seek", "resume"]);

        f.script.lock().ended = true;
        assert!(!f.watchdog.poll_end_of_media(ActivityState::Sleep));
        f.watchdog.set_paused(true).unwrap();
        assert!(!f.watchdog.poll_end_of_media(ActivityState::LowPower));
        assert_eq!(f.watchdog.stats().loops, 1);
    }

    #[test]
    fn test_paused_profile_is_not_resumed() {
        let mut f = fixture(true);
        f.watchdog.tick(DeviceTime::ZERO, AWAKE);
        f.watchdog.set_paused(true).unwrap();

        assert_eq!(
            f.watchdog.tick(DeviceTime::from_secs(10), ActivityState::LowPower),
            WatchdogAction::HeldPaused
        );
        f.watchdog.set_paused(false).unwrap();
        assert!(f.script.lock().health.is_playing);
    }

    #[test]
    fn test_config_validation() {
        assert!(WatchdogConfig::default().validate().is_ok());
        let bad = WatchdogConfig {
            settle_delay: Duration::from_secs(30),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let never_polls = WatchdogConfig {
            end_poll_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(never_polls.validate().is_err());
    }
}
