//! Daemon assembly
//!
//! Builds every engine from a [`KioskConfig`], starts the background
//! tasks (motion link, update schedule, status writer) and hands the
//! controller to the event loop.
//!
//! Only an invalid configuration stops start-up. Storage, update and
//! sensor link problems are logged and the kiosk runs without that part,
//! playing whatever asset it can open.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use kiosk_core::{AssetLayout, Clock, KioskError, KioskResult, MediaLock, MonotonicClock};
use kiosk_playback::{PlaybackWatchdog, ProcessPlayerFactory};
use kiosk_sensor::{ActivityStateMachine, OrientationTracker};
use kiosk_update::{HttpFetcher, PipelineEvent, UpdatePipeline};

use crate::{
    run_event_loop, spawn_status_writer, Controller, ControllerStats, KioskConfig, LoggingSurface, MotionLink,
};

/// Run until SIGINT or SIGTERM
pub async fn run_daemon(config: KioskConfig) -> KioskResult<ControllerStats> {
    run_daemon_until(config, shutdown_signal()).await
}

/// Run until `shutdown` resolves
pub async fn run_daemon_until(
    config: KioskConfig,
    shutdown: impl Future<Output = ()>,
) -> KioskResult<ControllerStats> {
    config.validate()?;
    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    let layout = config.layout();
    if let Err(e) = layout.ensure_dir() {
        tracing::warn!(error = %e, dir = %layout.asset_dir.display(), "asset directory unavailable");
    }

    let media_lock = MediaLock::new();
    let (pipeline_tx, pipeline_rx) = mpsc::unbounded_channel();
    let mut background: Vec<JoinHandle<()>> = Vec::new();

    let pipeline = if config.update.enabled {
        match start_pipeline(&config, &layout, &media_lock, pipeline_tx).await {
            Ok(pipeline) => {
                if let Some(path) = &config.storage.status_file {
                    background.push(spawn_status_writer(pipeline.status(), path.clone()));
                }
                background.push(Arc::clone(&pipeline).spawn_schedule());
                Some(pipeline)
            }
            Err(e) => {
                tracing::warn!(error = %e, kind = ?e.kind(), "update pipeline unavailable, running without updates");
                None
            }
        }
    } else {
        tracing::info!("updates disabled, playing local assets only");
        drop(pipeline_tx);
        None
    };

    let field_of_view = pipeline
        .as_ref()
        .map(|p| p.field_of_view())
        .unwrap_or(config.update.default_field_of_view);

    let (program, args) = config
        .player
        .command
        .split_first()
        .ok_or_else(|| KioskError::Config("player command is empty".into()))?;
    let watchdog = PlaybackWatchdog::with_config(
        config.watchdog_config(),
        layout,
        ProcessPlayerFactory::new(program.clone(), args.to_vec()),
        media_lock,
    );

    let controller = Controller::new(
        Arc::clone(&clock),
        OrientationTracker::with_config(config.orientation_config()),
        ActivityStateMachine::with_config(config.activity_config(), clock.now()),
        watchdog,
        Box::new(LoggingSurface::new()),
        pipeline,
        field_of_view,
    );

    // Held until shutdown so the loop keeps running without a sensor link
    let (event_tx, event_rx) = mpsc::channel(config.sensor.buffer.max(1));
    let sensor = match MotionLink::bind(config.sensor.listen).await {
        Ok(link) => {
            background.push(link.start_receive_loop(Arc::clone(&clock), event_tx.clone()));
            Some(link.local_addr())
        }
        Err(e) => {
            tracing::warn!(error = %e, listen = %config.sensor.listen, "motion link unavailable, activity decays only");
            None
        }
    };

    let health_interval = health_interval(&config);
    tracing::info!(
        sensor = ?sensor,
        health_interval = %humantime::format_duration(health_interval),
        "kiosk daemon running"
    );

    let stats = run_event_loop(controller, health_interval, event_rx, pipeline_rx, shutdown).await;
    drop(event_tx);

    for task in background {
        task.abort();
    }
    Ok(stats)
}

/// Open the asset store and settle any interrupted install
async fn start_pipeline(
    config: &KioskConfig,
    layout: &AssetLayout,
    media_lock: &MediaLock,
    events: mpsc::UnboundedSender<PipelineEvent>,
) -> KioskResult<Arc<UpdatePipeline>> {
    let fetcher = Arc::new(HttpFetcher::new(config.update.connect_timeout)?);
    let pipeline = Arc::new(UpdatePipeline::new(
        config.update_config(),
        layout.clone(),
        fetcher,
        media_lock.clone(),
        events,
    )?);
    let recovery = pipeline.recover().await?;
    tracing::info!(?recovery, version = %pipeline.effective_version(), "asset store ready");
    Ok(pipeline)
}

/// One tick drives both activity decay and the watchdog
pub fn health_interval(config: &KioskConfig) -> Duration {
    config.activity.tick_interval.min(config.watchdog.tick_interval)
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
