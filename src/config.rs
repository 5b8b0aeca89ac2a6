use serde::{de, Deserialize, Deserializer};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::models::{Identity, Location};

const DEFAULT_SCAN_DURATION_SECS: u64 = 30;
const DEFAULT_SCAN_WINDOW_SECS: u64 = 3;
const DEFAULT_SCAN_PAUSE_SECS: u64 = 1;
const DEFAULT_INTERVAL_SECS: u64 = 5;
const DEFAULT_BACKOFF_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Timing of the collection loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSettings {
    /// Total time readings are pooled before averaging
    pub duration: Duration,
    /// Length of a single discovery invocation
    pub window: Duration,
    /// Pause between discovery invocations
    pub pause: Duration,
    /// Wait after a completed cycle
    pub interval: Duration,
    /// Wait after a failed cycle
    pub backoff: Duration,
}

impl Default for ScanSettings {
    fn default() -> Self {
        ScanSettings {
            duration: Duration::from_secs(DEFAULT_SCAN_DURATION_SECS),
            window: Duration::from_secs(DEFAULT_SCAN_WINDOW_SECS),
            pause: Duration::from_secs(DEFAULT_SCAN_PAUSE_SECS),
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            backoff: Duration::from_secs(DEFAULT_BACKOFF_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BeaconConfig {
    pub identity: Identity,
    pub scan: ScanSettings,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default, deserialize_with = "scalar_string")]
    beacon_id: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    zone: Option<String>,
    x: Option<f64>,
    y: Option<f64>,
    #[serde(default)]
    scan: RawScan,
}

#[derive(Debug, Default, Deserialize)]
struct RawScan {
    duration_secs: Option<u64>,
    window_secs: Option<u64>,
    pause_secs: Option<u64>,
    interval_secs: Option<u64>,
    backoff_secs: Option<u64>,
}

/// Accept any YAML scalar for an identity label, so `beacon_id: 101` reads
/// as "101". Sequences and mappings are rejected.
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_yaml::Value>::deserialize(deserializer)? {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(serde_yaml::Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected a scalar, found {:?}",
            other
        ))),
    }
}

impl BeaconConfig {
    /// Load the beacon configuration from a YAML file.
    ///
    /// Identity keys are optional and forwarded as-is; only an unreadable or
    /// structurally malformed file is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let document: serde_yaml::Value = serde_yaml::from_str(contents)?;
        if !document.is_mapping() {
            return Err(ConfigError::Invalid(
                "top level of the config must be a mapping".into(),
            ));
        }
        let raw: RawConfig = serde_yaml::from_value(document)?;

        let defaults = ScanSettings::default();
        let secs = |value: Option<u64>, fallback: Duration| {
            value.map(Duration::from_secs).unwrap_or(fallback)
        };
        let scan = ScanSettings {
            duration: secs(raw.scan.duration_secs, defaults.duration),
            window: secs(raw.scan.window_secs, defaults.window),
            pause: secs(raw.scan.pause_secs, defaults.pause),
            interval: secs(raw.scan.interval_secs, defaults.interval),
            backoff: secs(raw.scan.backoff_secs, defaults.backoff),
        };
        if scan.duration.is_zero() {
            return Err(ConfigError::Invalid("scan.duration_secs must be > 0".into()));
        }
        if scan.window.is_zero() {
            return Err(ConfigError::Invalid("scan.window_secs must be > 0".into()));
        }

        Ok(BeaconConfig {
            identity: Identity {
                beacon_id: raw.beacon_id,
                location: Location {
                    zone: raw.zone,
                    x: raw.x,
                    y: raw.y,
                },
            },
            scan,
        })
    }
}
