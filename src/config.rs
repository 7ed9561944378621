//! Configuration types for qmdown
//!
//! Every field has a serde default, so an empty JSON object (or no config file
//! at all) yields a working configuration. Command line flags are layered on
//! top by the binary.

use crate::error::{Error, Result};
use crate::quality::Quality;
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// Download behavior configuration (directories, concurrency, quality)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory tracks are saved to (default: current directory)
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Number of concurrent download workers (default: 8)
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,

    /// Highest quality tier to request; lower tiers are used as fallback
    #[serde(default)]
    pub quality: Quality,

    /// Re-download tracks whose destination file already exists (default: false)
    #[serde(default)]
    pub overwrite: bool,

    /// Per-request timeout (default: 10 seconds)
    #[serde(default = "default_request_timeout", with = "duration_millis")]
    pub request_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            num_workers: default_num_workers(),
            quality: Quality::default(),
            overwrite: false,
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Retry behavior for transient transfer failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per task, including the first one (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_millis")]
    pub initial_delay: Duration,

    /// Upper bound for the delay between retries (default: 10 seconds)
    #[serde(default = "default_max_delay", with = "duration_millis")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Terminal output configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Render progress bars (default: true)
    #[serde(default = "default_true")]
    pub progress: bool,

    /// Minimum interval between byte-progress events of one task (default: 100ms)
    #[serde(default = "default_progress_interval", with = "duration_millis")]
    pub progress_interval: Duration,

    /// Capacity of the event channel feeding the progress reporter (default: 1024)
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            progress: true,
            progress_interval: default_progress_interval(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Main configuration
///
/// Fields are organized into sub-configs:
/// - [`download`](DownloadConfig) - output directory, concurrency, quality
/// - [`retry`](RetryConfig) - attempt bound and backoff
/// - [`display`](DisplayConfig) - progress rendering
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Retry settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Display settings
    #[serde(default)]
    pub display: DisplayConfig,
}

impl Config {
    /// Load a configuration from a JSON file
    ///
    /// Missing fields fall back to their defaults. The result is validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the downloader cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.download.num_workers == 0 {
            return Err(Error::config("must be at least 1", "num_workers"));
        }
        if self.download.request_timeout.is_zero() {
            return Err(Error::config("must be greater than zero", "request_timeout"));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::config("must be at least 1", "max_attempts"));
        }
        let multiplier = self.retry.backoff_multiplier;
        if multiplier.is_nan() || multiplier < 1.0 {
            return Err(Error::config(
                format!("must be >= 1.0, got {multiplier}"),
                "backoff_multiplier",
            ));
        }
        if self.retry.initial_delay > self.retry.max_delay {
            return Err(Error::config(
                "initial_delay must not exceed max_delay",
                "initial_delay",
            ));
        }
        if self.display.event_capacity == 0 {
            return Err(Error::config("must be at least 1", "event_capacity"));
        }
        Ok(())
    }

    /// Output directory
    pub fn output_dir(&self) -> &PathBuf {
        &self.download.output_dir
    }
}

// Default value functions
fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_num_workers() -> usize {
    8
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_user_agent() -> String {
    concat!("qmdown/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_progress_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_event_capacity() -> usize {
    1024
}

// Duration serialization helper (milliseconds)
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.download.num_workers, 8);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.download.quality, Quality::Mp3_320);
        assert!(config.display.progress);
    }

    #[test]
    fn empty_json_yields_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.download.num_workers, 8);
        assert_eq!(config.retry.initial_delay, Duration::from_secs(1));
        assert_eq!(config.display.progress_interval, Duration::from_millis(100));
    }

    #[test]
    fn partial_json_overrides_only_given_fields() {
        let json = r#"{
            "download": { "num_workers": 2, "quality": "flac" },
            "retry": { "initial_delay": 250 }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.download.num_workers, 2);
        assert_eq!(config.download.quality, Quality::Flac);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(250));
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut config = Config::default();
        config.download.num_workers = 0;
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("num_workers")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn zero_request_timeout_is_rejected() {
        let mut config = Config::default();
        config.download.request_timeout = Duration::ZERO;
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("request_timeout")),
            other => panic!("expected config error, got {other:?}"),
        }

        let config: Config =
            serde_json::from_str(r#"{ "download": { "request_timeout": 0 } }"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn shrinking_backoff_is_rejected() {
        let mut config = Config::default();
        config.retry.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());
        config.retry.backoff_multiplier = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn from_file_reads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qmdown.json");
        std::fs::write(&path, r#"{ "download": { "num_workers": 0 } }"#).unwrap();
        assert!(matches!(
            Config::from_file(&path),
            Err(Error::Config { .. })
        ));

        std::fs::write(&path, r#"{ "download": { "overwrite": true } }"#).unwrap();
        let config = Config::from_file(&path).unwrap();
        assert!(config.download.overwrite);
    }

    #[test]
    fn from_file_missing_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("absent.json"));
    }

    #[test]
    fn durations_serialize_as_millis() {
        let config = Config::default();
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["retry"]["initial_delay"], 1000);
        assert_eq!(value["download"]["request_timeout"], 10_000);
    }
}
