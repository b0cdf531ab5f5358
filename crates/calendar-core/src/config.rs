use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_BROKER_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_STREAM: &str = "notifications";
pub const DEFAULT_GROUP: &str = "storer";
pub const DEFAULT_CONSUMER: &str = "storer-1";
pub const DEFAULT_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_RETENTION_SECS: u64 = 365 * 24 * 60 * 60; // one year

/// Top-level config (calendar.toml + CALENDAR_* env overrides).
///
/// Every section has defaults, so an absent file yields a usable config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Fallback filter directive when `RUST_LOG` is unset (e.g. "info", "debug").
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

/// Which event store backend to open.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StorageKind {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub kind: StorageKind,
    /// SQLite database file; ignored by the memory backend.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::default(),
            path: default_db_path(),
        }
    }
}

/// Broker connectivity. Passed verbatim to the producer / consumer constructors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_url")]
    pub url: String,
    /// Stream (topic) carrying serialized notifications.
    #[serde(default = "default_stream")]
    pub stream: String,
    /// Consumer group shared by all storer instances.
    #[serde(default = "default_group")]
    pub group: String,
    /// Consumer name inside the group; unique per storer instance.
    #[serde(default = "default_consumer")]
    pub consumer: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base backoff; attempt `n` sleeps `n * retry_backoff_ms`.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Approximate upper bound on stream length (XADD MAXLEN ~).
    #[serde(default = "default_max_len")]
    pub max_len: usize,
    /// How long one XREADGROUP call blocks waiting for entries.
    #[serde(default = "default_block_ms")]
    pub block_ms: u64,
}

impl BrokerConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: default_broker_url(),
            stream: default_stream(),
            group: default_group(),
            consumer: default_consumer(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_len: default_max_len(),
            block_ms: default_block_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Tick period, and width of the look-ahead window of the notify pass.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Events starting further back than this are purged by the cleanup pass.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            retention_secs: default_retention_secs(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_level() -> String {
    "info".to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.calendar/calendar.db", home)
}
fn default_broker_url() -> String {
    DEFAULT_BROKER_URL.to_string()
}
fn default_stream() -> String {
    DEFAULT_STREAM.to_string()
}
fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}
fn default_consumer() -> String {
    DEFAULT_CONSUMER.to_string()
}
fn default_max_attempts() -> u32 {
    10
}
fn default_retry_backoff_ms() -> u64 {
    1_000
}
fn default_max_len() -> usize {
    10_000
}
fn default_block_ms() -> u64 {
    1_000
}
fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}
fn default_retention_secs() -> u64 {
    DEFAULT_RETENTION_SECS
}

impl CalendarConfig {
    /// Load config from a TOML file with CALENDAR_* env var overrides.
    ///
    /// Nested keys use a double underscore: `CALENDAR_BROKER__MAX_ATTEMPTS=3`.
    /// Path resolution: explicit argument, then `~/.calendar/calendar.toml`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: CalendarConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CALENDAR_").split("__"))
            .extract()
            .map_err(|e| crate::error::CalendarError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.calendar/calendar.toml", home)
}
