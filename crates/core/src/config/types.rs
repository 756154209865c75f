use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::transcode::{TranscoderConfig, VideoProcessingConfig};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub transcoder: TranscoderConfig,
    #[serde(default)]
    pub processing: VideoProcessingConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    8080
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
///
/// `RUST_LOG`, when set, takes precedence over `level`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Background job configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobsConfig {
    /// Processing runs allowed at once; further jobs wait in `Queued`.
    #[serde(default = "default_max_parallel_jobs")]
    pub max_parallel_jobs: usize,
    /// Finished jobs kept for lookup; the oldest are dropped beyond this.
    #[serde(default = "default_max_retained_jobs")]
    pub max_retained_jobs: usize,
    /// Seconds a finished job stays visible.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_parallel_jobs: default_max_parallel_jobs(),
            max_retained_jobs: default_max_retained_jobs(),
            retention_secs: default_retention_secs(),
        }
    }
}

fn default_max_parallel_jobs() -> usize {
    2
}

fn default_max_retained_jobs() -> usize {
    1000
}

fn default_retention_secs() -> u64 {
    24 * 60 * 60
}

/// Directories the HTTP API may read from and write to
///
/// Request paths are resolved against these roots and must stay inside them.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_input_root")]
    pub input_root: PathBuf,
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            input_root: default_input_root(),
            output_root: default_output_root(),
        }
    }
}

fn default_input_root() -> PathBuf {
    PathBuf::from("data/uploads")
}

fn default_output_root() -> PathBuf {
    PathBuf::from("data/media")
}
