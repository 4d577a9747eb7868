//! Update Pipeline - check, download, verify, install
//!
//! A check cycle is transactional: any failure before the install step
//! leaves the canonical asset and the installed token as they were. The
//! field of view is separate from versioning: it is applied on every
//! successful manifest fetch.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{timeout, MissedTickBehavior};

use kiosk_core::{AssetLayout, AssetVersion, KioskError, KioskResult, MediaLock, VersionPolicy};

use crate::{
    clamp_field_of_view, progress_ratio, sha256_file, AssetFetcher, Manifest, Recovery, StatusHandle, UpdatePhase,
    UpdateStatus, VersionStore, DEFAULT_FIELD_OF_VIEW, MAX_FIELD_OF_VIEW, MIN_FIELD_OF_VIEW,
};

/// Update Pipeline configuration
#[derive(Clone, Debug)]
pub struct UpdateConfig {
    /// Fixed manifest location
    pub manifest_url: String,
    /// Interval between scheduled checks
    pub check_interval: Duration,
    /// Bound on the manifest fetch
    pub fetch_timeout: Duration,
    /// Bound on the whole asset download
    pub download_timeout: Duration,
    pub version_policy: VersionPolicy,
    /// Token of the bundled fallback asset
    pub baseline_version: AssetVersion,
    /// Field of view when neither manifest nor record has one (degrees)
    pub default_field_of_view: f64,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        UpdateConfig {
            manifest_url: String::new(),
            check_interval: Duration::from_secs(3600),
            fetch_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(30 * 60),
            version_policy: VersionPolicy::Auto,
            baseline_version: AssetVersion::from(0),
            default_field_of_view: DEFAULT_FIELD_OF_VIEW,
        }
    }
}

impl UpdateConfig {
    pub fn validate(&self) -> KioskResult<()> {
        if self.manifest_url.trim().is_empty() {
            return Err(KioskError::Config("manifest URL is empty".into()));
        }
        if self.check_interval.is_zero() || self.fetch_timeout.is_zero() || self.download_timeout.is_zero() {
            return Err(KioskError::Config("update intervals and timeouts must be non-zero".into()));
        }
        if !(MIN_FIELD_OF_VIEW..=MAX_FIELD_OF_VIEW).contains(&self.default_field_of_view) {
            return Err(KioskError::Config(format!(
                "default field of view {} outside [{}, {}]",
                self.default_field_of_view, MIN_FIELD_OF_VIEW, MAX_FIELD_OF_VIEW
            )));
        }
        Ok(())
    }
}

/// Result of one check cycle
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum UpdateOutcome {
    NoChange,
    Updated { version: AssetVersion },
    Failed(String),
    /// Another check was in progress; nothing was done
    AlreadyRunning,
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOutcome::NoChange => f.write_str("no change"),
            UpdateOutcome::Updated { version } => write!(f, "updated to {}", version),
            UpdateOutcome::Failed(reason) => write!(f, "failed: {}", reason),
            UpdateOutcome::AlreadyRunning => f.write_str("already running"),
        }
    }
}

/// Notices for the controller
#[derive(Clone, Debug, PartialEq)]
pub enum PipelineEvent {
    /// A manifest field of view was applied (degrees)
    FieldOfView(f64),
    /// A new canonical asset was installed
    ContentChanged { version: AssetVersion, path: PathBuf },
    /// A scheduled check finished
    CheckFinished(UpdateOutcome),
}

/// Clears the re-entrancy flag on every exit path
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Update Pipeline
pub struct UpdatePipeline {
    config: UpdateConfig,
    layout: AssetLayout,
    fetcher: Arc<dyn AssetFetcher>,
    store: Mutex<VersionStore>,
    media_lock: MediaLock,
    running: AtomicBool,
    status: watch::Sender<UpdateStatus>,
    events: mpsc::UnboundedSender<PipelineEvent>,
}

impl UpdatePipeline {
    /// Open the persisted record under `layout` and build the pipeline
    pub fn new(
        config: UpdateConfig,
        layout: AssetLayout,
        fetcher: Arc<dyn AssetFetcher>,
        media_lock: MediaLock,
        events: mpsc::UnboundedSender<PipelineEvent>,
    ) -> KioskResult<Self> {
        let store = VersionStore::open(layout.record_path())?;
        let field_of_view = store.field_of_view().unwrap_or(config.default_field_of_view);
        let (status, _) = watch::channel(UpdateStatus::new(field_of_view, store.installed_version().cloned()));

        Ok(UpdatePipeline {
            config,
            layout,
            fetcher,
            store: Mutex::new(store),
            media_lock,
            running: AtomicBool::new(false),
            status,
            events,
        })
    }

    /// Read-only status for the presentation layer
    pub fn status(&self) -> StatusHandle {
        StatusHandle::new(self.status.subscribe())
    }

    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// Field of view in force (degrees)
    pub fn field_of_view(&self) -> f64 {
        self.status.borrow().field_of_view
    }

    /// Token the installed content is known by: the persisted token when a
    /// canonical asset exists, the bundled baseline otherwise
    pub fn effective_version(&self) -> AssetVersion {
        let installed = self.store.lock().installed_version().cloned();
        match installed {
            Some(version) if self.layout.has_canonical() => version,
            _ => self.config.baseline_version.clone(),
        }
    }

    /// Settle an install interrupted by a crash and clear stale downloads.
    /// A canonical asset that cannot be read counts as not landed.
    pub async fn recover(&self) -> KioskResult<Recovery> {
        self.remove_staging().await;

        let pending = self.store.lock().pending().cloned();
        if pending.is_none() {
            return Ok(Recovery::Clean);
        }

        let canonical = self.layout.canonical_path();
        let actual = match sha256_file(&canonical).await {
            Ok(digest) => Some(digest),
            Err(KioskError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(error = %e, path = %canonical.display(), "canonical asset unreadable");
                None
            }
        };

        let recovery = self.store.lock().resolve_pending(actual.as_deref())?;
        let installed = self.store.lock().installed_version().cloned();
        self.status.send_modify(|s| s.installed_version = installed);
        Ok(recovery)
    }

    /// Apply and persist a one-time field of view from the presentation layer
    pub fn override_field_of_view(&self, fov: f64) -> KioskResult<f64> {
        if !fov.is_finite() {
            return Err(KioskError::Config(format!("field of view {}", fov)));
        }
        let fov = clamp_field_of_view(fov);
        self.persist_field_of_view(fov)?;
        tracing::info!(fov, "field of view override applied");
        Ok(fov)
    }

    /// One check cycle. Returns `AlreadyRunning` at once when another
    /// cycle holds the pipeline.
    pub async fn check_and_update(&self) -> UpdateOutcome {
        let Some(_running) = RunGuard::acquire(&self.running) else {
            tracing::debug!("update check already in progress");
            return UpdateOutcome::AlreadyRunning;
        };

        self.status.send_modify(|s| {
            s.phase = UpdatePhase::Checking;
            s.progress = None;
        });

        let outcome = match self.run_check().await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, kind = ?e.kind(), "update check failed");
                self.remove_staging().await;
                UpdateOutcome::Failed(e.to_string())
            }
        };

        let installed = self.store.lock().installed_version().cloned();
        self.status.send_modify(|s| {
            s.phase = UpdatePhase::Idle;
            s.progress = None;
            s.is_downloading = false;
            s.installed_version = installed;
            s.last_outcome = Some(outcome.clone());
            s.checks += 1;
        });
        tracing::info!(outcome = %outcome, "update check finished");
        outcome
    }

    /// Run a check now and then every `check_interval`, forever
    pub fn spawn_schedule(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.check_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let outcome = self.check_and_update().await;
                if self.events.send(PipelineEvent::CheckFinished(outcome)).is_err() {
                    tracing::debug!("controller gone, stopping update schedule");
                    return;
                }
            }
        })
    }

    async fn run_check(&self) -> KioskResult<UpdateOutcome> {
        let url = &self.config.manifest_url;
        let body = timeout(self.config.fetch_timeout, self.fetcher.fetch_manifest(url))
            .await
            .map_err(|_| KioskError::Timeout(self.config.fetch_timeout))??;
        let manifest = Manifest::parse(&body)?;

        let fov = manifest.field_of_view_or(self.config.default_field_of_view);
        self.persist_field_of_view(fov)?;
        self.notify(PipelineEvent::FieldOfView(fov));

        let current = self.effective_version();
        if !self.config.version_policy.should_update(&manifest.version, &current) {
            tracing::debug!(remote = %manifest.version, current = %current, "asset up to date");
            return Ok(UpdateOutcome::NoChange);
        }
        tracing::info!(remote = %manifest.version, current = %current, url = %manifest.video_url, "downloading new asset");

        let staging = self.layout.staging_path();
        let bytes = timeout(self.config.download_timeout, self.download(&manifest.video_url))
            .await
            .map_err(|_| KioskError::Timeout(self.config.download_timeout))??;

        self.status.send_modify(|s| {
            s.phase = UpdatePhase::Verifying;
            s.is_downloading = false;
        });
        let actual = sha256_file(&staging).await?;
        if let Some(expected) = &manifest.sha256 {
            if *expected != actual {
                return Err(KioskError::DigestMismatch {
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        self.status.send_modify(|s| s.phase = UpdatePhase::Installing);
        let version = self.install(&manifest.version, actual)?;
        tracing::info!(version = %version, bytes, "asset installed");

        self.notify(PipelineEvent::ContentChanged {
            version: version.clone(),
            path: self.layout.canonical_path(),
        });
        Ok(UpdateOutcome::Updated { version })
    }

    /// Stream the asset into the staging file, publishing progress
    async fn download(&self, url: &str) -> KioskResult<u64> {
        tokio::fs::create_dir_all(&self.layout.asset_dir).await?;
        let mut stream = self.fetcher.open_download(url).await?;
        let total = stream.content_length();

        let mut file = tokio::fs::File::create(self.layout.staging_path()).await?;
        let mut written = 0u64;
        self.status.send_modify(|s| {
            s.phase = UpdatePhase::Downloading;
            s.is_downloading = true;
            s.progress = progress_ratio(0, total);
        });

        while let Some(chunk) = stream.next_chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            let progress = progress_ratio(written, total);
            self.status.send_if_modified(|s| {
                let changed = s.progress != progress;
                s.progress = progress;
                changed
            });
        }
        file.flush().await?;
        file.sync_all().await?;

        if let Some(total) = total {
            if written != total {
                return Err(KioskError::Fetch(format!("short download: {} of {} bytes", written, total)));
            }
        }
        Ok(written)
    }

    /// Journal, move, commit. Holds the media lock throughout.
    fn install(&self, version: &AssetVersion, sha256: String) -> KioskResult<AssetVersion> {
        let _asset = self.media_lock.lock();
        let mut store = self.store.lock();

        store.begin_install(version.clone(), sha256)?;
        if let Err(e) = std::fs::rename(self.layout.staging_path(), self.layout.canonical_path()) {
            if let Err(abort) = store.abort_install() {
                tracing::error!(error = %abort, "could not clear install journal");
            }
            return Err(e.into());
        }
        store.commit_install()
    }

    fn persist_field_of_view(&self, fov: f64) -> KioskResult<()> {
        self.store.lock().set_field_of_view(fov)?;
        self.status.send_if_modified(|s| {
            let changed = s.field_of_view != fov;
            s.field_of_view = fov;
            changed
        });
        Ok(())
    }

    fn notify(&self, event: PipelineEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("no controller listening for pipeline events");
        }
    }

    async fn remove_staging(&self) {
        match tokio::fs::remove_file(self.layout.staging_path()).await {
            Ok(()) => tracing::debug!("removed staged download"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(error = %e, "could not remove staged download"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use async_trait::async_trait;
    use bytes::Bytes;
    use tokio::sync::Notify;

    use crate::{sha256_hex, ByteStream};

    const VIDEO_URL: &str = "https://cdn.example/pano.mp4";

    #[derive(Default)]
    struct TestFetcher {
        manifest: Option<String>,
        assets: HashMap<String, Vec<u8>>,
        gate: Option<Arc<Notify>>,
        stall: bool,
    }

    impl TestFetcher {
        fn serving(manifest: &str, asset: &[u8]) -> Self {
            let mut assets = HashMap::new();
            assets.insert(VIDEO_URL.to_string(), asset.to_vec());
            TestFetcher {
                manifest: Some(manifest.to_string()),
                assets,
                ..Default::default()
            }
        }
    }

    struct ChunkStream {
        chunks: std::vec::IntoIter<Bytes>,
        len: u64,
    }

    #[async_trait]
    impl ByteStream for ChunkStream {
        fn content_length(&self) -> Option<u64> {
            Some(self.len)
        }

        async fn next_chunk(&mut self) -> KioskResult<Option<Bytes>> {
            Ok(self.chunks.next())
        }
    }

    #[async_trait]
    impl AssetFetcher for TestFetcher {
        async fn fetch_manifest(&self, _url: &str) -> KioskResult<Bytes> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.stall {
                std::future::pending::<()>().await;
            }
            let manifest = self.manifest.clone();
            manifest
                .map(Bytes::from)
                .ok_or_else(|| KioskError::Fetch("connection refused".into()))
        }

        async fn open_download(&self, url: &str) -> KioskResult<Box<dyn ByteStream>> {
            let data = self
                .assets
                .get(url)
                .ok_or_else(|| KioskError::HttpStatus {
                    status: 404,
                    url: url.to_string(),
                })?;
            let chunks: Vec<Bytes> = data.chunks(7).map(Bytes::copy_from_slice).collect();
            Ok(Box::new(ChunkStream {
                chunks: chunks.into_iter(),
                len: data.len() as u64,
            }))
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        layout: AssetLayout,
        pipeline: UpdatePipeline,
        events: mpsc::UnboundedReceiver<PipelineEvent>,
    }

    /// Pipeline over a fresh directory, optionally with an installed asset
    fn fixture(fetcher: TestFetcher, baseline: &str, installed: Option<(&str, &[u8])>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let layout = AssetLayout::new(dir.path().join("assets"), dir.path().join("bundled.mp4"));
        if let Some((version, bytes)) = installed {
            install_existing(&layout, version, bytes);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let config = UpdateConfig {
            manifest_url: "https://cdn.example/manifest.json".into(),
            baseline_version: AssetVersion::parse(baseline).unwrap(),
            fetch_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let pipeline = UpdatePipeline::new(config, layout.clone(), Arc::new(fetcher), MediaLock::new(), tx).unwrap();
        Fixture {
            _dir: dir,
            layout,
            pipeline,
            events: rx,
        }
    }

    /// Seed an installed asset and record
    fn install_existing(layout: &AssetLayout, version: &str, bytes: &[u8]) {
        layout.ensure_dir().unwrap();
        std::fs::write(layout.canonical_path(), bytes).unwrap();
        let mut store = VersionStore::open(layout.record_path()).unwrap();
        store
            .begin_install(AssetVersion::parse(version).unwrap(), sha256_hex(bytes))
            .unwrap();
        store.commit_install().unwrap();
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<PipelineEvent>) -> Vec<PipelineEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    fn content_changes(events: &[PipelineEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, PipelineEvent::ContentChanged { .. }))
            .count()
    }

    #[tokio::test]
    async fn test_newer_version_is_installed() {
        let new_asset = b"new panorama frames".repeat(10);
        let manifest = format!(
            r#"{{"version": 9, "videoURL": "{}", "fieldOfView": 90, "sha256": "{}"}}"#,
            VIDEO_URL,
            sha256_hex(&new_asset)
        );
        let dir = tempfile::tempdir().unwrap();
        let layout = AssetLayout::new(dir.path().join("assets"), dir.path().join("bundled.mp4"));
        install_existing(&layout, "7", b"old frames");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let pipeline = UpdatePipeline::new(
            UpdateConfig {
                manifest_url: "https://cdn.example/manifest.json".into(),
                ..Default::default()
            },
            layout.clone(),
            Arc::new(TestFetcher::serving(&manifest, &new_asset)),
            MediaLock::new(),
            tx,
        )
        .unwrap();

        let outcome = pipeline.check_and_update().await;
        let nine = AssetVersion::from(9);
        assert_eq!(outcome, UpdateOutcome::Updated { version: nine.clone() });
        assert_eq!(std::fs::read(layout.canonical_path()).unwrap(), new_asset);
        assert!(!layout.staging_path().exists());

        let store = VersionStore::open(layout.record_path()).unwrap();
        assert_eq!(store.installed_version(), Some(&nine));
        assert!(store.pending().is_none());

        let events = drain(&mut rx);
        assert_eq!(content_changes(&events), 1);
        assert!(events.contains(&PipelineEvent::FieldOfView(90.0)));

        let status = pipeline.status().snapshot();
        assert_eq!(status.installed_version, Some(nine));
        assert_eq!(status.phase, UpdatePhase::Idle);
        assert!(!status.is_downloading);
        assert_eq!(status.checks, 1);
    }

    #[tokio::test]
    async fn test_equal_version_is_no_change() {
        let manifest = format!(r#"{{"version": "7", "videoURL": "{}"}}"#, VIDEO_URL);
        let mut f = fixture(TestFetcher::serving(&manifest, b"unused"), "0", Some(("7", &b"old frames"[..])));

        assert_eq!(f.pipeline.check_and_update().await, UpdateOutcome::NoChange);
        assert_eq!(std::fs::read(f.layout.canonical_path()).unwrap(), b"old frames");
        assert_eq!(content_changes(&drain(&mut f.events)), 0);
    }

    #[tokio::test]
    async fn test_baseline_matches_on_first_run() {
        let manifest = format!(r#"{{"version": "B0", "videoURL": "{}"}}"#, VIDEO_URL);
        let f = fixture(TestFetcher::serving(&manifest, b"unused"), "B0", None);

        assert_eq!(f.pipeline.check_and_update().await, UpdateOutcome::NoChange);
        assert!(!f.layout.has_canonical());
        assert_eq!(f.layout.playable_source(), f.layout.fallback);
    }

    #[tokio::test]
    async fn test_digest_mismatch_leaves_everything() {
        let manifest = format!(
            r#"{{"version": 9, "videoURL": "{}", "sha256": "{}"}}"#,
            VIDEO_URL,
            sha256_hex(b"something else")
        );
        let mut f = fixture(
            TestFetcher::serving(&manifest, b"tampered frames"),
            "0",
            Some(("7", &b"old frames"[..])),
        );

        let outcome = f.pipeline.check_and_update().await;
        assert!(matches!(outcome, UpdateOutcome::Failed(ref reason) if reason.contains("Digest mismatch")));
        assert_eq!(std::fs::read(f.layout.canonical_path()).unwrap(), b"old frames");
        assert!(!f.layout.staging_path().exists());

        let store = VersionStore::open(f.layout.record_path()).unwrap();
        assert_eq!(store.installed_version(), Some(&AssetVersion::from(7)));
        assert!(store.pending().is_none());
        assert_eq!(content_changes(&drain(&mut f.events)), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_changes_nothing() {
        let mut f = fixture(TestFetcher::default(), "0", None);
        let before = f.pipeline.field_of_view();

        let outcome = f.pipeline.check_and_update().await;
        assert!(matches!(outcome, UpdateOutcome::Failed(_)));
        assert_eq!(f.pipeline.field_of_view(), before);
        assert!(!f.layout.record_path().exists());
        assert!(drain(&mut f.events).is_empty());
    }

    #[tokio::test]
    async fn test_manifest_without_url_fails() {
        let f = fixture(TestFetcher::serving(r#"{"version": 12}"#, b""), "0", None);
        let outcome = f.pipeline.check_and_update().await;
        assert!(matches!(outcome, UpdateOutcome::Failed(ref reason) if reason.contains("videoURL")));
        assert!(!f.layout.record_path().exists());
    }

    #[tokio::test]
    async fn test_field_of_view_applied_without_update() {
        let manifest = format!(r#"{{"version": "7", "videoURL": "{}", "fov": 100}}"#, VIDEO_URL);
        let mut f = fixture(TestFetcher::serving(&manifest, b""), "0", Some(("7", &b"old frames"[..])));

        assert_eq!(f.pipeline.check_and_update().await, UpdateOutcome::NoChange);
        assert_eq!(f.pipeline.field_of_view(), 100.0);
        assert_eq!(VersionStore::open(f.layout.record_path()).unwrap().field_of_view(), Some(100.0));
        assert_eq!(drain(&mut f.events), vec![PipelineEvent::FieldOfView(100.0)]);
    }

    #[tokio::test]
    async fn test_missing_field_of_view_uses_default() {
        let manifest = format!(r#"{{"version": "0", "videoURL": "{}"}}"#, VIDEO_URL);
        let f = fixture(TestFetcher::serving(&manifest, b""), "0", None);
        f.pipeline.override_field_of_view(110.0).unwrap();

        f.pipeline.check_and_update().await;
        assert_eq!(f.pipeline.field_of_view(), DEFAULT_FIELD_OF_VIEW);
    }

    #[tokio::test]
    async fn test_concurrent_check_is_rejected() {
        let gate = Arc::new(Notify::new());
        let manifest = format!(r#"{{"version": "0", "videoURL": "{}"}}"#, VIDEO_URL);
        let fetcher = TestFetcher {
            gate: Some(gate.clone()),
            ..TestFetcher::serving(&manifest, b"")
        };
        let f = fixture(fetcher, "0", None);

        let (first, second) = tokio::join!(f.pipeline.check_and_update(), async {
            let outcome = f.pipeline.check_and_update().await;
            gate.notify_one();
            outcome
        });
        assert_eq!(first, UpdateOutcome::NoChange);
        assert_eq!(second, UpdateOutcome::AlreadyRunning);
        assert_eq!(f.pipeline.status().snapshot().checks, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manifest_timeout_fails() {
        let fetcher = TestFetcher {
            stall: true,
            ..Default::default()
        };
        let f = fixture(fetcher, "0", None);
        let outcome = f.pipeline.check_and_update().await;
        assert!(matches!(outcome, UpdateOutcome::Failed(ref reason) if reason.contains("Timed out")));
    }

    #[tokio::test]
    async fn test_recover_commits_landed_install() {
        let f = fixture(TestFetcher::default(), "0", None);
        f.layout.ensure_dir().unwrap();
        std::fs::write(f.layout.canonical_path(), b"landed").unwrap();
        {
            let mut store = VersionStore::open(f.layout.record_path()).unwrap();
            store.begin_install(AssetVersion::from(9), sha256_hex(b"landed")).unwrap();
        }
        // Reopen so the pipeline sees the journal left by the "crash"
        let (tx, _rx) = mpsc::unbounded_channel();
        let pipeline = UpdatePipeline::new(
            f.pipeline.config().clone(),
            f.layout.clone(),
            Arc::new(TestFetcher::default()),
            MediaLock::new(),
            tx,
        )
        .unwrap();

        assert_eq!(pipeline.recover().await.unwrap(), Recovery::Committed(AssetVersion::from(9)));
        assert_eq!(pipeline.effective_version(), AssetVersion::from(9));
    }

    #[tokio::test]
    async fn test_recover_discards_unlanded_install() {
        let dir = tempfile::tempdir().unwrap();
        let layout = AssetLayout::new(dir.path(), dir.path().join("bundled.mp4"));
        install_existing(&layout, "7", b"old frames");
        std::fs::write(layout.staging_path(), b"half a downl").unwrap();
        {
            let mut store = VersionStore::open(layout.record_path()).unwrap();
            store.begin_install(AssetVersion::from(9), sha256_hex(b"new")).unwrap();
        }

        let (tx, _rx) = mpsc::unbounded_channel();
        let config = UpdateConfig {
            manifest_url: "https://cdn.example/manifest.json".into(),
            ..Default::default()
        };
        let pipeline =
            UpdatePipeline::new(config, layout.clone(), Arc::new(TestFetcher::default()), MediaLock::new(), tx).unwrap();

        assert_eq!(pipeline.recover().await.unwrap(), Recovery::Discarded(AssetVersion::from(9)));
        assert_eq!(pipeline.effective_version(), AssetVersion::from(7));
        assert!(!layout.staging_path().exists());
    }

    #[tokio::test]
    async fn test_recover_discards_when_canonical_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let layout = AssetLayout::new(dir.path(), dir.path().join("bundled.mp4"));
        std::fs::create_dir_all(layout.canonical_path()).unwrap();
        {
            let mut store = VersionStore::open(layout.record_path()).unwrap();
            store.begin_install(AssetVersion::from(4), sha256_hex(b"four")).unwrap();
        }

        let (tx, _rx) = mpsc::unbounded_channel();
        let config = UpdateConfig {
            manifest_url: "https://cdn.example/manifest.json".into(),
            ..Default::default()
        };
        let pipeline =
            UpdatePipeline::new(config, layout.clone(), Arc::new(TestFetcher::default()), MediaLock::new(), tx).unwrap();

        assert_eq!(pipeline.recover().await.unwrap(), Recovery::Discarded(AssetVersion::from(4)));
        assert_eq!(pipeline.effective_version(), AssetVersion::from(0));
        assert!(VersionStore::open(layout.record_path()).unwrap().pending().is_none());
    }

    #[test]
    fn test_config_validation() {
        assert!(UpdateConfig::default().validate().is_err());
        let config = UpdateConfig {
            manifest_url: "https://cdn.example/manifest.json".into(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(UpdateOutcome::Updated {
            version: AssetVersion::from(9),
        })
        .unwrap();
        assert_eq!(json["outcome"], "updated");
        assert_eq!(json["detail"]["version"], "9");
    }
}
