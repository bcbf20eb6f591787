use chrono::Duration;
use detector::EngineConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

const MIN_DATAGRAM_BYTES: usize = 32;

// The top-level configuration struct that maps directly to the YAML file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub feed: FeedConfig,
    #[serde(default)]
    pub detector: DetectorSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FeedConfig {
    pub source: SourceConfig,
    #[serde(default = "default_max_datagram_bytes")]
    pub max_datagram_bytes: usize,
    /// Stop the feed after this many seconds.
    #[serde(default)]
    pub session_duration_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum SourceConfig {
    #[serde(rename = "udp")]
    Udp {
        publisher: SocketAddr,
        #[serde(default = "default_listen")]
        listen: SocketAddr,
    },
    #[serde(rename = "file")]
    File {
        path: String,
        #[serde(default = "default_records_per_datagram")]
        records_per_datagram: usize,
        /// Pause between replayed datagrams.
        #[serde(default)]
        interval_ms: Option<u64>,
    },
}

impl SourceConfig {
    /// A replay of `path` with the default datagram size and no pacing.
    pub fn replay(path: impl Into<String>) -> Self {
        SourceConfig::File {
            path: path.into(),
            records_per_datagram: default_records_per_datagram(),
            interval_ms: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DetectorSettings {
    pub tolerance: f64,
    pub stale_after_ms: u64,
    pub principal: f64,
    /// Suppress re-reporting an identical cycle within this window.
    pub dedup_window_ms: Option<u64>,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            tolerance: engine.tolerance,
            stale_after_ms: engine.stale_after.num_milliseconds().unsigned_abs(),
            principal: engine.principal,
            dedup_window_ms: None,
        }
    }
}

fn default_max_datagram_bytes() -> usize {
    4096
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

fn default_records_per_datagram() -> usize {
    1
}

fn millis(ms: u64) -> Duration {
    i64::try_from(ms)
        .ok()
        .and_then(Duration::try_milliseconds)
        .unwrap_or(Duration::MAX)
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.max_datagram_bytes < MIN_DATAGRAM_BYTES {
            return Err(ConfigError::ValidationError(format!(
                "max_datagram_bytes must be at least {}",
                MIN_DATAGRAM_BYTES
            )));
        }
        if self.feed.session_duration_secs == Some(0) {
            return Err(ConfigError::ValidationError(
                "session_duration_secs must be greater than 0".to_string(),
            ));
        }

        match &self.feed.source {
            SourceConfig::Udp { listen, .. } => {
                if !listen.is_ipv4() {
                    return Err(ConfigError::ValidationError(format!(
                        "listen address {} must be IPv4",
                        listen
                    )));
                }
                if listen.ip().is_unspecified() {
                    return Err(ConfigError::ValidationError(format!(
                        "listen address {} cannot be sent to the publisher",
                        listen
                    )));
                }
            }
            SourceConfig::File {
                path,
                records_per_datagram,
                ..
            } => {
                if path.is_empty() {
                    return Err(ConfigError::ValidationError(
                        "Replay file path cannot be empty".to_string(),
                    ));
                }
                if *records_per_datagram == 0 {
                    return Err(ConfigError::ValidationError(
                        "records_per_datagram must be greater than 0".to_string(),
                    ));
                }
            }
        }

        let detector = &self.detector;
        if !detector.tolerance.is_finite() || detector.tolerance <= 0.0 {
            return Err(ConfigError::ValidationError(
                "Detector tolerance must be a positive number".to_string(),
            ));
        }
        if detector.stale_after_ms == 0 {
            return Err(ConfigError::ValidationError(
                "stale_after_ms must be greater than 0".to_string(),
            ));
        }
        if !detector.principal.is_finite() || detector.principal <= 0.0 {
            return Err(ConfigError::ValidationError(
                "Principal must be a positive number".to_string(),
            ));
        }
        if detector.dedup_window_ms == Some(0) {
            return Err(ConfigError::ValidationError(
                "dedup_window_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            tolerance: self.detector.tolerance,
            stale_after: millis(self.detector.stale_after_ms),
            principal: self.detector.principal,
            dedup_window: self.detector.dedup_window_ms.map(millis),
        }
    }

    pub fn session_limit(&self) -> Option<std::time::Duration> {
        self.feed
            .session_duration_secs
            .map(std::time::Duration::from_secs)
    }
}

/// Loads and validates the configuration at `path`.
pub async fn load_config_from_path(path: &str) -> Result<AppConfig, ConfigError> {
    let config_str = tokio::fs::read_to_string(path).await?;
    let config = AppConfig::from_yaml_str(&config_str)?;
    config.validate()?;
    Ok(config)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
