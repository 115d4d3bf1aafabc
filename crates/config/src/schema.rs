//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Downstream downloader configuration
    #[serde(default, alias = "jd")]
    pub jdownloader: JDownloaderConfig,
    /// Buffer replay configuration
    #[serde(default)]
    pub replay: ReplayConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Security configuration
    #[serde(default)]
    pub security: SecurityConfig,
}

/// Which delivery gateway implementation to run
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GatewayMode {
    /// Talk to a real JDownloader over its local HTTP API
    #[default]
    Real,
    /// Deterministic in-process stand-in
    Simulated,
}

/// Downstream downloader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JDownloaderConfig {
    /// Host of the JDownloader local API (scheme optional)
    #[serde(default = "default_jd_host")]
    pub host: String,
    /// Port of the JDownloader local API
    #[serde(default = "default_jd_port")]
    pub port: u16,
    /// Gateway implementation
    #[serde(default)]
    pub mode: GatewayMode,
    /// Connectivity probe interval in milliseconds
    #[serde(default = "default_poll_interval_ms", alias = "pollIntervalMs")]
    pub poll_interval_ms: u64,
    /// Upper bound for a single delivery or probe call in milliseconds
    #[serde(default = "default_delivery_timeout_ms", alias = "deliveryTimeoutMs")]
    pub delivery_timeout_ms: u64,
    /// Initial connectivity of the simulated gateway
    #[serde(default = "default_true", alias = "simulatedOnline")]
    pub simulated_online: bool,
}

/// Buffer replay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Run periodic replay passes in addition to transition-triggered ones
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Periodic replay interval in seconds
    #[serde(default = "default_replay_interval")]
    pub interval_seconds: u64,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Maximum request body size in bytes (container uploads)
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_seconds: u64,
    /// Enable WAL mode for SQLite
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Enable request logging
    #[serde(default = "default_true")]
    pub request_logging: bool,
}

/// Security configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Bearer token required by every non-probe endpoint
    pub api_token: Option<String>,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_jd_host() -> String {
    "127.0.0.1".to_string()
}

fn default_jd_port() -> u16 {
    3128
}

fn default_poll_interval_ms() -> u64 {
    3_000
}

fn default_delivery_timeout_ms() -> u64 {
    10_000
}

fn default_replay_interval() -> u64 {
    30
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_request_timeout() -> u64 {
    60
}

fn default_max_body_size() -> usize {
    10 * 1024 * 1024 // 10MB
}

fn default_database_url() -> String {
    "sqlite:data/jd_bridge.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl JDownloaderConfig {
    /// Base URL of the JDownloader local API
    pub fn api_url(&self) -> String {
        types::utils::downloader_base_url(&self.host, self.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}

impl ReplayConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

impl Default for JDownloaderConfig {
    fn default() -> Self {
        Self {
            host: default_jd_host(),
            port: default_jd_port(),
            mode: GatewayMode::default(),
            poll_interval_ms: default_poll_interval_ms(),
            delivery_timeout_ms: default_delivery_timeout_ms(),
            simulated_online: default_true(),
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_seconds: default_replay_interval(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
            max_body_size: default_max_body_size(),
            cors_enabled: default_true(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            connection_timeout_seconds: default_connection_timeout(),
            wal_mode: default_true(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            request_logging: default_true(),
        }
    }
}
