use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use weatherlog_model::TcpProbe;

use crate::retry::RetryPolicy;

/// Environment variable that overrides `webhook_url` from the config file.
pub const WEBHOOK_URL_ENV: &str = "WEATHERLOG_WEBHOOK_URL";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Runtime settings of the data logger.
///
/// Every field has a default, so a config file only needs the values it changes.
/// Durations are given in seconds.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub log_path: PathBuf,
    pub webhook_url: Option<String>,

    pub i2c_device: String,
    pub i2c_address: u8,

    pub probe_address: SocketAddr,
    #[serde(
        serialize_with = "seconds::serialize",
        deserialize_with = "seconds::deserialize_nonzero"
    )]
    pub probe_timeout: Duration,
    #[serde(
        serialize_with = "seconds::serialize",
        deserialize_with = "seconds::deserialize_nonzero"
    )]
    pub request_timeout: Duration,

    #[serde(with = "seconds")]
    pub sample_interval: Duration,
    pub retry: RetryPolicy,

    /// Stop cleanly after this many rows. Unlimited if absent.
    pub max_samples: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("/home/pi/BME280_data.csv"),
            webhook_url: None,
            i2c_device: "/dev/i2c-1".into(),
            i2c_address: 0x77,
            probe_address: TcpProbe::DEFAULT_TARGET.into(),
            probe_timeout: TcpProbe::DEFAULT_TIMEOUT,
            request_timeout: Duration::from_secs(30),
            sample_interval: Duration::from_secs(2),
            retry: RetryPolicy::default(),
            max_samples: None,
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_json(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The per-user config file, e.g. `~/.config/weatherlog/config.json` on Linux.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "weatherlog")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Loads `explicit` if given, otherwise the default config file if there is one,
    /// otherwise the built-in defaults. The webhook environment variable wins over the file.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|path| path.is_file()) {
                Some(path) => {
                    log::debug!("Using config file {}", path.display());
                    Self::from_file(&path)?
                }
                None => Self::default(),
            },
        };

        if let Ok(url) = std::env::var(WEBHOOK_URL_ENV) {
            if !url.is_empty() {
                config.webhook_url = Some(url);
            }
        }

        Ok(config)
    }
}

pub(crate) mod seconds {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }

    /// Socket timeouts: a zero timeout is rejected by the OS, so it is rejected here.
    pub fn deserialize_nonzero<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        let duration = deserialize(deserializer)?;
        if duration.is_zero() {
            return Err(serde::de::Error::custom("timeout must be greater than zero"));
        }
        Ok(duration)
    }
}

#[test]
fn test_defaults() {
    let config = Config::default();

    assert_eq!(config.i2c_address, 0x77);
    assert_eq!(config.probe_address, "8.8.8.8:53".parse::<SocketAddr>().unwrap());
    assert_eq!(config.probe_timeout, Duration::from_secs(5));
    assert_eq!(config.sample_interval, Duration::from_secs(2));
    assert_eq!(config.retry.interval, Duration::from_secs(5));
    assert_eq!(config.retry.max_attempts, None);
    assert_eq!(config.max_samples, None);
}

#[test]
fn test_partial_json_overrides_fields() {
    let config = Config::from_json(
        r#"{
            "log_path": "/tmp/readings.csv",
            "webhook_url": "https://example.invalid/hook",
            "sample_interval": 0.5,
            "retry": { "interval": 1, "max_attempts": 3 }
        }"#,
    )
    .unwrap();

    assert_eq!(config.log_path, PathBuf::from("/tmp/readings.csv"));
    assert_eq!(config.webhook_url.as_deref(), Some("https://example.invalid/hook"));
    assert_eq!(config.sample_interval, Duration::from_millis(500));
    assert_eq!(config.retry.interval, Duration::from_secs(1));
    assert_eq!(config.retry.jitter, Duration::ZERO);
    assert_eq!(config.retry.max_attempts, Some(3));
    assert_eq!(config.i2c_device, "/dev/i2c-1");
}

#[test]
fn test_unknown_field_is_rejected() {
    assert!(Config::from_json(r#"{ "log_file": "/tmp/x.csv" }"#).is_err());
}

#[test]
fn test_negative_duration_is_rejected() {
    assert!(Config::from_json(r#"{ "sample_interval": -1 }"#).is_err());
}

#[test]
fn test_zero_timeouts_are_rejected() {
    assert!(Config::from_json(r#"{ "probe_timeout": 0 }"#).is_err());
    assert!(Config::from_json(r#"{ "request_timeout": 0.0 }"#).is_err());

    let config = Config::from_json(r#"{ "probe_timeout": 0.25, "sample_interval": 0 }"#).unwrap();
    assert_eq!(config.probe_timeout, Duration::from_millis(250));
    assert_eq!(config.sample_interval, Duration::ZERO);
}

#[test]
fn test_from_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    match Config::from_file(&path) {
        Err(ConfigError::Parse { path: p, .. }) => assert_eq!(p, path),
        other => panic!("unexpected result: {other:?}"),
    }
}
