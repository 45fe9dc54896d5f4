//! Daemon configuration.
//!
//! Loaded once at startup from a TOML file, then layered with
//! environment overrides (secrets may live in the environment only) and
//! validated. Every tunable that changes detection sensitivity is a
//! named field here rather than a constant buried in the loop.

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use url::Url;

const DEFAULT_MIN_THRESHOLD_PERCENT: f64 = 0.0;
const DEFAULT_COOLDOWN_S: u64 = 10;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
const DEFAULT_FETCH_BACKOFF_MS: u64 = 1_000;
const DEFAULT_FETCH_TIMEOUT_S: u64 = 10;
const DEFAULT_CHANNEL_DELTA: u16 = 20;
const DEFAULT_MIN_REGION_AREA: u64 = 0;
const DEFAULT_HISTORY_CAP: usize = 100;
const DEFAULT_MIN_EVENTS: usize = 10;
const DEFAULT_MULTIPLIER: f64 = 1.15;
const DEFAULT_ANNOTATE: bool = true;

#[derive(Debug, Deserialize, Default)]
struct WatchConfigFile {
    telegram: Option<TelegramConfigFile>,
    detection: Option<DetectionConfigFile>,
    #[serde(default)]
    camera: Vec<CameraConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct TelegramConfigFile {
    token: Option<String>,
    chat_id: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    poll_interval_ms: Option<u64>,
    fetch_backoff_ms: Option<u64>,
    fetch_timeout_s: Option<u64>,
    channel_delta: Option<u16>,
    min_region_area: Option<u64>,
    history_cap: Option<usize>,
    min_events: Option<usize>,
    multiplier: Option<f64>,
    annotate: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct CameraConfigFile {
    name: String,
    snapshot_url: String,
    threshold_percent: f64,
    min_threshold_percent: Option<f64>,
    cooldown_s: Option<u64>,
    enabled: Option<bool>,
}

/// Full daemon configuration.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub telegram: TelegramSettings,
    pub detection: DetectionConfig,
    pub cameras: Vec<CameraConfig>,
}

/// Delivery credentials for the Telegram Bot API.
#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub token: String,
    pub chat_id: i64,
}

/// Detection tunables shared by every camera worker.
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Sleep between polling cycles.
    pub poll_interval: Duration,
    /// Sleep after a failed snapshot fetch before retrying.
    pub fetch_backoff: Duration,
    /// Hard timeout on a single snapshot request.
    pub fetch_timeout: Duration,
    /// Per-channel diff threshold on the 16-bit channel scale.
    pub channel_delta: u16,
    /// Smallest changed-region area (pixels) that counts as motion.
    pub min_region_area: u64,
    /// Per-camera adaptive history window length.
    pub history_cap: usize,
    /// History length required before the dynamic threshold arms.
    pub min_events: usize,
    /// Mean multiplier for the dynamic threshold.
    pub multiplier: f64,
    /// Draw the changed-region rectangle on alert snapshots.
    pub annotate: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            fetch_backoff: Duration::from_millis(DEFAULT_FETCH_BACKOFF_MS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_S),
            channel_delta: DEFAULT_CHANNEL_DELTA,
            min_region_area: DEFAULT_MIN_REGION_AREA,
            history_cap: DEFAULT_HISTORY_CAP,
            min_events: DEFAULT_MIN_EVENTS,
            multiplier: DEFAULT_MULTIPLIER,
            annotate: DEFAULT_ANNOTATE,
        }
    }
}

/// One camera descriptor.
#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub name: String,
    pub snapshot_url: String,
    /// Static threshold used until the camera's history arms.
    pub threshold_percent: f64,
    /// Change percentages at or below this are noise.
    pub min_threshold_percent: f64,
    /// Minimum wall-clock interval between alerts.
    pub cooldown: Duration,
    pub enabled: bool,
}

impl WatchConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let file: WatchConfigFile = toml::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        let mut cfg = Self::from_file(file);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: WatchConfigFile) -> Self {
        let telegram = file.telegram.unwrap_or_default();
        let detection = file.detection.unwrap_or_default();
        let defaults = DetectionConfig::default();

        Self {
            telegram: TelegramSettings {
                token: telegram.token.unwrap_or_default(),
                chat_id: telegram.chat_id.unwrap_or(0),
            },
            detection: DetectionConfig {
                poll_interval: detection
                    .poll_interval_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.poll_interval),
                fetch_backoff: detection
                    .fetch_backoff_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.fetch_backoff),
                fetch_timeout: detection
                    .fetch_timeout_s
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.fetch_timeout),
                channel_delta: detection.channel_delta.unwrap_or(defaults.channel_delta),
                min_region_area: detection
                    .min_region_area
                    .unwrap_or(defaults.min_region_area),
                history_cap: detection.history_cap.unwrap_or(defaults.history_cap),
                min_events: detection.min_events.unwrap_or(defaults.min_events),
                multiplier: detection.multiplier.unwrap_or(defaults.multiplier),
                annotate: detection.annotate.unwrap_or(defaults.annotate),
            },
            cameras: file
                .camera
                .into_iter()
                .map(|camera| CameraConfig {
                    name: camera.name,
                    snapshot_url: camera.snapshot_url,
                    threshold_percent: camera.threshold_percent,
                    min_threshold_percent: camera
                        .min_threshold_percent
                        .unwrap_or(DEFAULT_MIN_THRESHOLD_PERCENT),
                    cooldown: Duration::from_secs(
                        camera.cooldown_s.unwrap_or(DEFAULT_COOLDOWN_S),
                    ),
                    enabled: camera.enabled.unwrap_or(true),
                })
                .collect(),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(token) = std::env::var("SNAPWATCH_TELEGRAM_TOKEN") {
            if !token.trim().is_empty() {
                self.telegram.token = token;
            }
        }
        if let Ok(chat_id) = std::env::var("SNAPWATCH_TELEGRAM_CHAT_ID") {
            if !chat_id.trim().is_empty() {
                self.telegram.chat_id = chat_id
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("SNAPWATCH_TELEGRAM_CHAT_ID must be an integer"))?;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.telegram.token.trim().is_empty() {
            return Err(anyhow!(
                "telegram token is required (config [telegram] or SNAPWATCH_TELEGRAM_TOKEN)"
            ));
        }
        if self.telegram.chat_id == 0 {
            return Err(anyhow!(
                "telegram chat_id is required (config [telegram] or SNAPWATCH_TELEGRAM_CHAT_ID)"
            ));
        }
        if self.cameras.is_empty() {
            return Err(anyhow!("at least one [[camera]] must be configured"));
        }

        let mut names = std::collections::HashSet::new();
        for camera in &self.cameras {
            if camera.name.trim().is_empty() {
                return Err(anyhow!("camera name must not be empty"));
            }
            if !names.insert(camera.name.as_str()) {
                return Err(anyhow!("duplicate camera name '{}'", camera.name));
            }
            let url = Url::parse(&camera.snapshot_url).with_context(|| {
                format!("camera '{}': invalid snapshot_url", camera.name)
            })?;
            match url.scheme() {
                "http" | "https" | "stub" => {}
                other => {
                    return Err(anyhow!(
                        "camera '{}': unsupported snapshot scheme '{}'; expected http(s) or stub",
                        camera.name,
                        other
                    ))
                }
            }
            if !(0.0..=100.0).contains(&camera.threshold_percent) {
                return Err(anyhow!(
                    "camera '{}': threshold_percent must be within 0..=100",
                    camera.name
                ));
            }
            if !(0.0..=100.0).contains(&camera.min_threshold_percent) {
                return Err(anyhow!(
                    "camera '{}': min_threshold_percent must be within 0..=100",
                    camera.name
                ));
            }
            if camera.min_threshold_percent > camera.threshold_percent {
                return Err(anyhow!(
                    "camera '{}': min_threshold_percent exceeds threshold_percent",
                    camera.name
                ));
            }
        }

        let detection = &self.detection;
        if detection.multiplier <= 0.0 {
            return Err(anyhow!("detection multiplier must be greater than zero"));
        }
        if detection.min_events == 0 {
            return Err(anyhow!("detection min_events must be at least 1"));
        }
        if detection.history_cap < detection.min_events {
            return Err(anyhow!(
                "detection history_cap must be at least min_events"
            ));
        }
        if detection.fetch_timeout.is_zero() {
            return Err(anyhow!("detection fetch_timeout_s must be greater than zero"));
        }
        Ok(())
    }
}
