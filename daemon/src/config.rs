//! Configuration management (TOML)

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

pub const SHAKE_THRESHOLD_BOUNDS: RangeInclusive<f64> = 10.0..=1000.0;
pub const RANGE_LIMIT_BOUNDS: RangeInclusive<f64> = 50.0..=500.0;
pub const DEFAULT_SHAKE_THRESHOLD: f64 = 150.0;
pub const DEFAULT_RANGE_LIMIT: f64 = 200.0;
pub const MIN_HISTORY_LEN: usize = 2;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("settings unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationMethod {
    Log,
    Desktop,
    Both,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub autostart: bool,
    pub sample_interval_ms: u64,
    pub notification_method: NotificationMethod,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            autostart: true,
            sample_interval_ms: 50,
            notification_method: NotificationMethod::Log,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub shake_threshold: f64,
    pub range_limit: f64,
    pub history_len: usize,
    pub min_movement: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            shake_threshold: DEFAULT_SHAKE_THRESHOLD,
            range_limit: DEFAULT_RANGE_LIMIT,
            history_len: 8,
            min_movement: 0.1,
        }
    }
}

/// The two geometric limits a window is judged against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Minimum path length the window must exceed.
    pub shake_threshold: f64,
    /// Net displacement the window must stay under.
    pub range_limit: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            shake_threshold: DEFAULT_SHAKE_THRESHOLD,
            range_limit: DEFAULT_RANGE_LIMIT,
        }
    }
}

/// NaN maps to the lower bound.
fn clamp_quiet(value: f64, bounds: &RangeInclusive<f64>) -> f64 {
    if value.is_nan() {
        return *bounds.start();
    }
    value.clamp(*bounds.start(), *bounds.end())
}

fn clamp_to(value: f64, bounds: &RangeInclusive<f64>, name: &str) -> f64 {
    let clamped = clamp_quiet(value, bounds);
    if value.is_nan() {
        warn!("{} is NaN, using lower bound {}", name, clamped);
    } else if clamped != value {
        warn!("{} {} out of range, clamped to {}", name, value, clamped);
    }
    clamped
}

impl DetectionConfig {
    /// Always within bounds. Read on every tick, so it clamps without logging.
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            shake_threshold: clamp_quiet(self.shake_threshold, &SHAKE_THRESHOLD_BOUNDS),
            range_limit: clamp_quiet(self.range_limit, &RANGE_LIMIT_BOUNDS),
        }
    }

    /// Stores the value clamped into bounds and returns what was stored.
    pub fn set_shake_threshold(&mut self, value: f64) -> f64 {
        self.shake_threshold = clamp_to(value, &SHAKE_THRESHOLD_BOUNDS, "shake_threshold");
        self.shake_threshold
    }

    /// Stores the value clamped into bounds and returns what was stored.
    pub fn set_range_limit(&mut self, value: f64) -> f64 {
        self.range_limit = clamp_to(value, &RANGE_LIMIT_BOUNDS, "range_limit");
        self.range_limit
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::parse(path)?;
        config.sanitize();
        Ok(config)
    }

    /// Reads the file as written, without sanitizing.
    fn parse(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        directories::ProjectDirs::from("", "", "shake-disconnect")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.general.sample_interval_ms.max(1))
    }

    /// Pulls every numeric setting back into its documented bounds.
    pub fn sanitize(&mut self) {
        let detection = &mut self.detection;
        detection.set_shake_threshold(detection.shake_threshold);
        detection.set_range_limit(detection.range_limit);
        if detection.history_len < MIN_HISTORY_LEN {
            warn!(
                "history_len {} too small, using {}",
                detection.history_len, MIN_HISTORY_LEN
            );
            detection.history_len = MIN_HISTORY_LEN;
        }
        if detection.min_movement.is_nan() || detection.min_movement < 0.0 {
            warn!("min_movement {} invalid, using 0", detection.min_movement);
            detection.min_movement = 0.0;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigStatus {
    Loaded,
    Missing,
    /// The file exists but could not be read or parsed.
    Invalid,
}

/// The daemon's config file. A file that failed to load is copied to
/// `<name>.bak` before the first save replaces it.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    backup_pending: AtomicBool,
}

impl ConfigStore {
    /// Loads `path`, falling back to defaults when it is missing or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> (Self, Config, ConfigStatus) {
        let path = path.into();
        let (config, status) = if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            (Config::default(), ConfigStatus::Missing)
        } else {
            match Config::load(&path) {
                Ok(config) => (config, ConfigStatus::Loaded),
                Err(e) => {
                    warn!("Failed to load config: {}, using defaults", e);
                    (Config::default(), ConfigStatus::Invalid)
                }
            }
        };
        let store = Self {
            path,
            backup_pending: AtomicBool::new(status == ConfigStatus::Invalid),
        };
        (store, config, status)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".bak");
        PathBuf::from(name)
    }

    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        if self.backup_pending.load(Ordering::Acquire) && self.path.exists() {
            let backup = self.backup_path();
            fs::copy(&self.path, &backup)?;
            warn!(
                "Replacing unreadable config {}, previous contents kept in {}",
                self.path.display(),
                backup.display()
            );
        }
        self.backup_pending.store(false, Ordering::Release);
        config.save(&self.path)
    }
}

/// Where the sampling loop reads its thresholds from on every tick.
pub trait ThresholdSource: Send + Sync {
    fn read_thresholds(&self) -> Result<Thresholds, ConfigError>;
}

/// In-memory configuration shared between the control surface and the loop.
#[derive(Debug, Default)]
pub struct SharedConfig {
    inner: RwLock<Config>,
}

impl SharedConfig {
    pub fn new(config: Config) -> Self {
        Self { inner: RwLock::new(config) }
    }

    pub fn snapshot(&self) -> Config {
        self.inner.read().clone()
    }

    pub fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Config) -> R,
    {
        f(&mut self.inner.write())
    }
}

impl ThresholdSource for SharedConfig {
    fn read_thresholds(&self) -> Result<Thresholds, ConfigError> {
        Ok(self.inner.read().detection.thresholds())
    }
}

/// Re-reads the TOML file each time, for hosts that persist settings themselves.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ThresholdSource for ConfigFile {
    fn read_thresholds(&self) -> Result<Thresholds, ConfigError> {
        Ok(Config::parse(&self.path)?.detection.thresholds())
    }
}
