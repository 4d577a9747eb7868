//! Daemon configuration file
//!
//! One TOML file, every section optional. Durations are human-readable
//! (`"10s"`, `"1h 30m"`).
//!
//! ```toml
//! [activity]
//! idle_threshold = "30s"
//! sleep_threshold = "1m"
//!
//! [update]
//! manifest_url = "https://cdn.example/kiosk/manifest.json"
//! check_interval = "1h"
//!
//! [storage]
//! asset_dir = "/var/lib/kioskd"
//! fallback_asset = "/usr/share/kioskd/default.mp4"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use kiosk_core::{AssetLayout, AssetVersion, KioskError, KioskResult, PowerProfile, VersionPolicy};
use kiosk_playback::WatchdogConfig;
use kiosk_sensor::{ActivityConfig, OrientationConfig, PitchSource};
use kiosk_update::UpdateConfig;

/// Duration fields as humantime strings
mod human_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivitySection {
    /// Summed |acceleration| (g) that counts as a visitor
    pub motion_threshold: f64,
    #[serde(with = "human_duration")]
    pub idle_threshold: Duration,
    #[serde(with = "human_duration")]
    pub sleep_threshold: Duration,
    #[serde(with = "human_duration")]
    pub wake_debounce: Duration,
    #[serde(with = "human_duration")]
    pub max_sample_gap: Duration,
    #[serde(with = "human_duration")]
    pub tick_interval: Duration,
    pub awake: PowerProfile,
    pub low_power: PowerProfile,
    pub sleep: PowerProfile,
}

impl Default for ActivitySection {
    fn default() -> Self {
        let c = ActivityConfig::default();
        Self {
            motion_threshold: c.motion_threshold,
            idle_threshold: c.idle_threshold,
            sleep_threshold: c.sleep_threshold,
            wake_debounce: c.wake_debounce,
            max_sample_gap: c.max_sample_gap,
            tick_interval: c.tick_interval,
            awake: c.awake,
            low_power: c.low_power,
            sleep: c.sleep,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PitchSourceSetting {
    GravityZ,
    Roll,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrientationSection {
    pub max_pitch_degrees: f64,
    pub pitch_source: PitchSourceSetting,
    /// 0 emits raw orientation
    pub smoothing: f64,
}

impl Default for OrientationSection {
    fn default() -> Self {
        Self {
            max_pitch_degrees: 60.0,
            pitch_source: PitchSourceSetting::GravityZ,
            smoothing: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogSection {
    #[serde(with = "human_duration")]
    pub tick_interval: Duration,
    #[serde(with = "human_duration")]
    pub settle_delay: Duration,
    /// How often the player process is checked for a clean exit
    #[serde(with = "human_duration")]
    pub end_poll_interval: Duration,
}

impl Default for WatchdogSection {
    fn default() -> Self {
        let c = WatchdogConfig::default();
        Self {
            tick_interval: c.tick_interval,
            settle_delay: c.settle_delay,
            end_poll_interval: c.end_poll_interval,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateSection {
    /// Offline kiosks play the bundled asset forever
    pub enabled: bool,
    pub manifest_url: String,
    #[serde(with = "human_duration")]
    pub check_interval: Duration,
    #[serde(with = "human_duration")]
    pub connect_timeout: Duration,
    #[serde(with = "human_duration")]
    pub fetch_timeout: Duration,
    #[serde(with = "human_duration")]
    pub download_timeout: Duration,
    pub version_policy: VersionPolicy,
    pub baseline_version: AssetVersion,
    pub default_field_of_view: f64,
}

impl Default for UpdateSection {
    fn default() -> Self {
        let c = UpdateConfig::default();
        Self {
            enabled: true,
            manifest_url: c.manifest_url,
            check_interval: c.check_interval,
            connect_timeout: Duration::from_secs(10),
            fetch_timeout: c.fetch_timeout,
            download_timeout: c.download_timeout,
            version_policy: c.version_policy,
            baseline_version: c.baseline_version,
            default_field_of_view: c.default_field_of_view,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub asset_dir: PathBuf,
    pub asset_name: String,
    pub record_name: String,
    /// Bundled, read-only asset
    pub fallback_asset: PathBuf,
    /// Where to publish update status as JSON for the presentation layer
    pub status_file: Option<PathBuf>,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            asset_dir: PathBuf::from("/var/lib/kioskd"),
            asset_name: kiosk_core::DEFAULT_ASSET_NAME.to_string(),
            record_name: kiosk_core::DEFAULT_RECORD_NAME.to_string(),
            fallback_asset: PathBuf::from("/usr/share/kioskd/default.mp4"),
            status_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSection {
    /// Player program and arguments; `{path}` is replaced by the asset
    pub command: Vec<String>,
}

impl Default for PlayerSection {
    fn default() -> Self {
        Self {
            command: ["mpv", "--really-quiet", "--fullscreen", "--no-osc", "{path}"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSection {
    /// UDP address the sensor bridge sends to
    pub listen: SocketAddr,
    /// Queued datagrams before the receive loop waits
    pub buffer: usize,
}

impl Default for SensorSection {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 7070)),
            buffer: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `EnvFilter` directives; `RUST_LOG` wins when set
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: "kioskd=info,kiosk_runtime=info,kiosk_sensor=info,kiosk_playback=info,kiosk_update=info".into(),
            json: false,
        }
    }
}

/// Whole daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    pub activity: ActivitySection,
    pub orientation: OrientationSection,
    pub watchdog: WatchdogSection,
    pub update: UpdateSection,
    pub storage: StorageSection,
    pub player: PlayerSection,
    pub sensor: SensorSection,
    pub logging: LoggingSection,
}

impl KioskConfig {
    /// Load `path`. A missing file yields defaults; an unreadable or
    /// invalid one is an error.
    pub fn load(path: &Path) -> KioskResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents).map_err(|e| match e {
                KioskError::Config(msg) => KioskError::Config(format!("{}: {}", path.display(), msg)),
                other => other,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(KioskError::Config(format!("{}: {}", path.display(), e))),
        }
    }

    pub fn parse(contents: &str) -> KioskResult<Self> {
        toml::from_str(contents).map_err(|e| KioskError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> KioskResult<String> {
        toml::to_string_pretty(self).map_err(|e| KioskError::Config(e.to_string()))
    }

    pub fn activity_config(&self) -> ActivityConfig {
        let a = &self.activity;
        ActivityConfig {
            motion_threshold: a.motion_threshold,
            idle_threshold: a.idle_threshold,
            sleep_threshold: a.sleep_threshold,
            wake_debounce: a.wake_debounce,
            max_sample_gap: a.max_sample_gap,
            tick_interval: a.tick_interval,
            awake: a.awake,
            low_power: a.low_power,
            sleep: a.sleep,
        }
    }

    pub fn orientation_config(&self) -> OrientationConfig {
        let o = &self.orientation;
        OrientationConfig {
            max_pitch: o.max_pitch_degrees.to_radians(),
            pitch_source: match o.pitch_source {
                PitchSourceSetting::GravityZ => PitchSource::GravityZ,
                PitchSourceSetting::Roll => PitchSource::Roll,
            },
            smoothing: o.smoothing,
        }
    }

    pub fn watchdog_config(&self) -> WatchdogConfig {
        WatchdogConfig {
            tick_interval: self.watchdog.tick_interval,
            settle_delay: self.watchdog.settle_delay,
            end_poll_interval: self.watchdog.end_poll_interval,
        }
    }

    pub fn update_config(&self) -> UpdateConfig {
        let u = &self.update;
        UpdateConfig {
            manifest_url: u.manifest_url.clone(),
            check_interval: u.check_interval,
            fetch_timeout: u.fetch_timeout,
            download_timeout: u.download_timeout,
            version_policy: u.version_policy,
            baseline_version: u.baseline_version.clone(),
            default_field_of_view: u.default_field_of_view,
        }
    }

    pub fn layout(&self) -> AssetLayout {
        let s = &self.storage;
        AssetLayout {
            asset_dir: s.asset_dir.clone(),
            asset_name: s.asset_name.clone(),
            record_name: s.record_name.clone(),
            fallback: s.fallback_asset.clone(),
        }
    }

    /// Reject inconsistent values
    pub fn validate(&self) -> KioskResult<()> {
        self.activity_config().validate()?;
        self.watchdog_config().validate()?;
        if self.update.enabled {
            self.update_config().validate()?;
        }

        let o = &self.orientation;
        if !(o.max_pitch_degrees > 0.0 && o.max_pitch_degrees <= 90.0) {
            return Err(KioskError::Config(format!(
                "max pitch {} must be in (0, 90] degrees",
                o.max_pitch_degrees
            )));
        }
        if !(0.0..1.0).contains(&o.smoothing) {
            return Err(KioskError::Config(format!("smoothing {} must be in [0, 1)", o.smoothing)));
        }
        if self.player.command.is_empty() {
            return Err(KioskError::Config("player command is empty".into()));
        }
        if self.storage.asset_name.is_empty() || self.storage.asset_name == self.storage.record_name {
            return Err(KioskError::Config(
                "asset and record names must be distinct and non-empty".into(),
            ));
        }
        if self.sensor.buffer == 0 {
            return Err(KioskError::Config("sensor buffer must be non-zero".into()));
        }
        Ok(())
    }
}
