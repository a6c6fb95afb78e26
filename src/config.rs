//! Configuration types for archive-organizer
//!
//! All settings have sensible defaults so `Config::default()` works out of the box for a
//! personal download folder. Settings can be loaded from a JSON file and then overlaid
//! with environment variables.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Readiness (debounce) parameters for the pending-file tracker
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessConfig {
    /// How often pending files are re-checked (default: 5 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Files younger than this never count as stable (default: 10 seconds)
    #[serde(default = "default_min_grace_delay", with = "duration_serde")]
    pub min_grace_delay: Duration,

    /// Consecutive unchanged polls required before processing (default: 3)
    #[serde(default = "default_stability_threshold")]
    pub stability_threshold: u32,

    /// Files are processed after this long even if still changing (default: 1 hour)
    #[serde(default = "default_max_wait", with = "duration_serde")]
    pub max_wait: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            min_grace_delay: default_min_grace_delay(),
            stability_threshold: default_stability_threshold(),
            max_wait: default_max_wait(),
        }
    }
}

impl ReadinessConfig {
    /// Quick preset for event-driven use where downloads finish with a single rename.
    pub fn responsive() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            min_grace_delay: Duration::from_secs(2),
            stability_threshold: 2,
            max_wait: Duration::from_secs(300),
        }
    }
}

/// Rule engine and naming settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizeConfig {
    /// Product-code prefix that marks a correctly named release folder (default: "RJ")
    #[serde(default = "default_product_prefix")]
    pub product_prefix: String,

    /// Case-insensitive marker that introduces the password chain (default: "pass-")
    #[serde(default = "default_password_marker")]
    pub password_marker: String,

    /// Name of the manifest written into quarantine folders
    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,

    /// chrono format used for the date prefix of quarantine folders (default: "%Y%m%d")
    #[serde(default = "default_date_format")]
    pub quarantine_date_format: String,

    /// Maximum cascade depth for nested archives (None = unbounded)
    #[serde(default)]
    pub max_cascade_depth: Option<u32>,
}

impl Default for OrganizeConfig {
    fn default() -> Self {
        Self {
            product_prefix: default_product_prefix(),
            password_marker: default_password_marker(),
            manifest_name: default_manifest_name(),
            quarantine_date_format: default_date_format(),
            max_cascade_depth: None,
        }
    }
}

/// Watch folder configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Directory whose direct children are watched and organized
    #[serde(default = "default_watch_root")]
    pub root: PathBuf,

    /// Enqueue archives already present in the root when the watcher starts
    #[serde(default)]
    pub scan_existing_on_start: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root: default_watch_root(),
            scan_existing_on_start: false,
        }
    }
}

/// Main configuration for archive-organizer
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Watch folder settings
    #[serde(default)]
    pub watch: WatchConfig,

    /// Readiness tracker settings
    #[serde(default)]
    pub readiness: ReadinessConfig,

    /// Rule engine settings
    #[serde(default)]
    pub organize: OrganizeConfig,
}

impl Config {
    /// Default configuration watching `root`
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            watch: WatchConfig {
                root: root.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay settings from the environment.
    ///
    /// Recognised variables (durations in whole seconds): `CHECK_INTERVAL`,
    /// `MIN_GRACE_DELAY`, `MIN_STABLE_CHECKS`, `MAX_WAIT_TIME`, `PRODUCT_PREFIX`.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(secs) = parse_var::<u64>(&lookup, "CHECK_INTERVAL")? {
            self.readiness.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "MIN_GRACE_DELAY")? {
            self.readiness.min_grace_delay = Duration::from_secs(secs);
        }
        if let Some(checks) = parse_var::<u32>(&lookup, "MIN_STABLE_CHECKS")? {
            self.readiness.stability_threshold = checks;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "MAX_WAIT_TIME")? {
            self.readiness.max_wait = Duration::from_secs(secs);
        }
        if let Some(prefix) = lookup("PRODUCT_PREFIX") {
            self.organize.product_prefix = prefix;
        }
        self.validate()
    }

    /// Reject settings the tracker or rule engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.readiness.poll_interval.is_zero() {
            return Err(config_error("poll interval must be positive", "poll_interval"));
        }
        if self.readiness.stability_threshold == 0 {
            return Err(config_error(
                "stability threshold must be at least 1",
                "stability_threshold",
            ));
        }
        if self.organize.product_prefix.is_empty() {
            return Err(config_error("product prefix must not be empty", "product_prefix"));
        }
        if self.organize.password_marker.trim().is_empty() {
            return Err(config_error(
                "password marker must not be empty",
                "password_marker",
            ));
        }
        if self.organize.manifest_name.is_empty() {
            return Err(config_error("manifest name must not be empty", "manifest_name"));
        }
        let bad_format = chrono::format::StrftimeItems::new(&self.organize.quarantine_date_format)
            .any(|item| matches!(item, chrono::format::Item::Error));
        if bad_format {
            return Err(config_error(
                "quarantine date format is not a valid strftime pattern",
                "quarantine_date_format",
            ));
        }
        Ok(())
    }
}

fn config_error(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| Error::Config {
            message: format!("{key} must be a non-negative integer, got {raw:?}"),
            key: Some(key.to_string()),
        }),
    }
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_min_grace_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_stability_threshold() -> u32 {
    3
}

fn default_max_wait() -> Duration {
    Duration::from_secs(3600)
}

fn default_product_prefix() -> String {
    "RJ".to_string()
}

fn default_password_marker() -> String {
    "pass-".to_string()
}

fn default_manifest_name() -> String {
    "processing_log.txt".to_string()
}

fn default_date_format() -> String {
    "%Y%m%d".to_string()
}

fn default_watch_root() -> PathBuf {
    PathBuf::from("downloads")
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
