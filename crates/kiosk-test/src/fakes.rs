//! Fake collaborators: a scriptable player and an in-memory asset server

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use kiosk_core::{KioskError, KioskResult, PlaybackHealth};
use kiosk_playback::{MediaPlayer, PlayerFactory};
use kiosk_update::{sha256_hex, AssetFetcher, ByteStream};

/// Counts of everything done to fake players
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlayerOps {
    pub created: u64,
    pub dropped: u64,
    pub health_checks: u64,
    pub resumes: u64,
    pub pauses: u64,
    pub seeks: u64,
    pub create_failures: u64,
}

impl PlayerOps {
    /// Calls made on a live player
    pub fn player_calls(&self) -> u64 {
        self.health_checks + self.resumes + self.pauses + self.seeks
    }
}

#[derive(Debug, Default)]
struct MonitorState {
    ops: PlayerOps,
    health: PlaybackHealth,
    fail_create: bool,
    sources: Vec<PathBuf>,
}

/// Shared view of every player a [`FakeFactory`] builds
#[derive(Clone, Debug, Default)]
pub struct PlayerMonitor {
    state: Arc<Mutex<MonitorState>>,
}

impl PlayerMonitor {
    pub fn new() -> Self {
        let monitor = Self::default();
        monitor.set_health(PlaybackHealth::PLAYING);
        monitor
    }

    pub fn ops(&self) -> PlayerOps {
        self.state.lock().ops.clone()
    }

    /// Health every live player reports from now on
    pub fn set_health(&self, health: PlaybackHealth) {
        self.state.lock().health = health;
    }

    /// Make the next creations fail (missing decoder, locked file)
    pub fn set_fail_create(&self, fail: bool) {
        self.state.lock().fail_create = fail;
    }

    /// Sources players were built for, in order
    pub fn sources(&self) -> Vec<PathBuf> {
        self.state.lock().sources.clone()
    }
}

/// Player whose health is scripted through its monitor
pub struct FakePlayer {
    source: PathBuf,
    monitor: PlayerMonitor,
}

impl MediaPlayer for FakePlayer {
    fn health(&mut self) -> PlaybackHealth {
        let mut state = self.monitor.state.lock();
        state.ops.health_checks += 1;
        state.health
    }

    fn resume(&mut self) -> KioskResult<()> {
        let mut state = self.monitor.state.lock();
        state.ops.resumes += 1;
        state.health = PlaybackHealth::PLAYING;
        Ok(())
    }

    fn pause(&mut self) -> KioskResult<()> {
        self.monitor.state.lock().ops.pauses += 1;
        Ok(())
    }

    fn seek_to_start(&mut self) -> KioskResult<()> {
        self.monitor.state.lock().ops.seeks += 1;
        Ok(())
    }

    fn source(&self) -> &Path {
        &self.source
    }
}

impl Drop for FakePlayer {
    fn drop(&mut self) {
        self.monitor.state.lock().ops.dropped += 1;
    }
}

/// Builds [`FakePlayer`]s reporting to one monitor
#[derive(Clone, Debug, Default)]
pub struct FakeFactory {
    monitor: PlayerMonitor,
}

impl FakeFactory {
    pub fn new(monitor: PlayerMonitor) -> Self {
        FakeFactory { monitor }
    }
}

impl PlayerFactory for FakeFactory {
    fn create(&mut self, source: &Path) -> KioskResult<Box<dyn MediaPlayer>> {
        let mut state = self.monitor.state.lock();
        if state.fail_create {
            state.ops.create_failures += 1;
            return Err(KioskError::Playback(format!("cannot open {}", source.display())));
        }
        state.ops.created += 1;
        state.health = PlaybackHealth::PLAYING;
        state.sources.push(source.to_path_buf());
        drop(state);

        Ok(Box::new(FakePlayer {
            source: source.to_path_buf(),
            monitor: self.monitor.clone(),
        }))
    }
}

#[derive(Debug, Default)]
struct ServerState {
    manifest: Option<String>,
    assets: HashMap<String, Vec<u8>>,
    offline: bool,
    manifest_requests: u64,
    downloads: u64,
}

/// In-memory manifest and asset server
#[derive(Clone, Debug, Default)]
pub struct FakeFetcher {
    state: Arc<Mutex<ServerState>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` as version `version` with a correct digest
    pub fn publish(&self, version: &str, bytes: &[u8], field_of_view: Option<f64>) -> String {
        self.publish_with_digest(version, bytes, field_of_view, &sha256_hex(bytes))
    }

    /// Serve `bytes` announcing `digest`, which may be wrong
    pub fn publish_with_digest(&self, version: &str, bytes: &[u8], field_of_view: Option<f64>, digest: &str) -> String {
        let url = format!("https://cdn.example/assets/{}.mp4", version);
        let fov = field_of_view
            .map(|f| format!(r#", "fieldOfView": {}"#, f))
            .unwrap_or_default();
        let manifest = format!(
            r#"{{"version": "{}", "videoURL": "{}", "sha256": "{}"{}}}"#,
            version, url, digest, fov
        );

        let mut state = self.state.lock();
        state.assets.insert(url.clone(), bytes.to_vec());
        state.manifest = Some(manifest);
        url
    }

    /// Serve a raw manifest document
    pub fn set_manifest(&self, manifest: &str) {
        self.state.lock().manifest = Some(manifest.to_string());
    }

    /// Refuse every request
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    pub fn manifest_requests(&self) -> u64 {
        self.state.lock().manifest_requests
    }

    pub fn downloads(&self) -> u64 {
        self.state.lock().downloads
    }
}

struct MemoryStream {
    chunks: std::vec::IntoIter<Bytes>,
    len: u64,
}

#[async_trait]
impl ByteStream for MemoryStream {
    fn content_length(&self) -> Option<u64> {
        Some(self.len)
    }

    async fn next_chunk(&mut self) -> KioskResult<Option<Bytes>> {
        Ok(self.chunks.next())
    }
}

#[async_trait]
impl AssetFetcher for FakeFetcher {
    async fn fetch_manifest(&self, url: &str) -> KioskResult<Bytes> {
        let mut state = self.state.lock();
        state.manifest_requests += 1;
        if state.offline {
            return Err(KioskError::Fetch(format!("{}: network unreachable", url)));
        }
        state
            .manifest
            .clone()
            .map(Bytes::from)
            .ok_or_else(|| KioskError::HttpStatus {
                status: 404,
                url: url.to_string(),
            })
    }

    async fn open_download(&self, url: &str) -> KioskResult<Box<dyn ByteStream>> {
        let mut state = self.state.lock();
        if state.offline {
            return Err(KioskError::Fetch(format!("{}: network unreachable", url)));
        }
        state.downloads += 1;
        let data = state.assets.get(url).ok_or_else(|| KioskError::HttpStatus {
            status: 404,
            url: url.to_string(),
        })?;
        let chunks: Vec<Bytes> = data.chunks(4096).map(Bytes::copy_from_slice).collect();
        Ok(Box::new(MemoryStream {
            chunks: chunks.into_iter(),
            len: data.len() as u64,
        }))
    }
}
