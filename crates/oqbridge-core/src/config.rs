//! Configuration shared by the query proxy and the migration worker.
//!
//! Both binaries load the same TOML schema, so a single file can drive a
//! whole deployment. Precedence:
//! 1. Environment variables (highest priority)
//! 2. TOML configuration file
//! 3. Default values (lowest priority)

use globset::Glob;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Main configuration structure for the bridge processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Proxy listen address.
    #[serde(default)]
    pub server: ServerConfig,

    /// Hot-store connection settings.
    pub hot_store: BackendConfig,

    /// Cold-store connection settings.
    pub cold_store: BackendConfig,

    /// Tiering policy: what counts as hot and which field carries time.
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Migration worker settings.
    #[serde(default)]
    pub migration: MigrationConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Proxy HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address (default: "0.0.0.0:9200").
    #[serde(default = "default_listen")]
    pub listen: String,
}

/// Connection settings for one backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL, e.g. "https://hot.example:9200".
    pub url: String,

    /// Service-account username for basic auth (empty disables).
    #[serde(default)]
    pub username: String,

    /// Service-account password.
    #[serde(default)]
    pub password: String,

    /// TLS settings for the backend connection.
    #[serde(default)]
    pub tls: TlsConfig,
}

/// TLS client settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Skip server certificate verification (testing only).
    #[serde(default)]
    pub skip_verify: bool,

    /// Path to a PEM CA certificate to trust in addition to system roots.
    #[serde(default)]
    pub ca_cert: String,
}

/// Tiering policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Days of data served from the hot store (default: 30).
    #[serde(default = "default_hot_days")]
    pub hot_days: i64,

    /// Default timestamp field name (default: "@timestamp").
    #[serde(default = "default_timestamp_field")]
    pub timestamp_field: String,

    /// Per-index timestamp field overrides.
    #[serde(default)]
    pub index_fields: HashMap<String, String>,

    /// Default cold-store retention in days; 0 keeps data forever.
    #[serde(default)]
    pub cold_days: i64,

    /// Per-pattern cold-retention overrides; first matching pattern wins.
    #[serde(default)]
    pub cold_overrides: Vec<ColdRetentionOverride>,
}

/// One cold-retention override entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColdRetentionOverride {
    /// Glob pattern over index names (`*`, `?`, `[…]`).
    pub pattern: String,
    /// Retention in days for matching indices; 0 keeps data forever.
    pub days: i64,
}

/// Migration worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Whether the scheduled migrator is active.
    #[serde(default)]
    pub enabled: bool,

    /// Hours between scheduled migration passes (default: 24).
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,

    /// Documents older than this many days are moved to the cold store.
    /// Must be strictly less than `retention.hot_days`.
    #[serde(default = "default_migrate_after_days")]
    pub migrate_after_days: i64,

    /// Scroll page size per slice (default: 5000).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Number of parallel sliced scroll workers (default: 4).
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Gzip-compress ingest payloads sent to the cold store.
    #[serde(default)]
    pub compress: bool,

    /// Directory for local checkpoint files (default: "/var/lib/oqbridge").
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: String,

    /// When non-empty, stage ingest payloads in temp files under this
    /// directory instead of in memory.
    #[serde(default)]
    pub temp_dir: String,

    /// Delete migrated documents from the hot store after a successful run.
    #[serde(default)]
    pub delete_after_migration: bool,

    /// Distributed lock TTL in seconds (default: 7200).
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,

    /// Index names or wildcard patterns to migrate.
    #[serde(default)]
    pub indices: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error (default: "info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty (default: "pretty").
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions

fn default_listen() -> String {
    "0.0.0.0:9200".to_string()
}

fn default_hot_days() -> i64 {
    30
}

fn default_timestamp_field() -> String {
    "@timestamp".to_string()
}

fn default_interval_hours() -> u64 {
    24
}

fn default_migrate_after_days() -> i64 {
    21
}

fn default_batch_size() -> usize {
    5000
}

fn default_workers() -> usize {
    4
}

fn default_checkpoint_dir() -> String {
    "/var/lib/oqbridge".to_string()
}

fn default_lock_ttl_secs() -> u64 {
    7200
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            hot_days: default_hot_days(),
            timestamp_field: default_timestamp_field(),
            index_fields: HashMap::new(),
            cold_days: 0,
            cold_overrides: Vec::new(),
        }
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_hours: default_interval_hours(),
            migrate_after_days: default_migrate_after_days(),
            batch_size: default_batch_size(),
            workers: default_workers(),
            compress: false,
            checkpoint_dir: default_checkpoint_dir(),
            temp_dir: String::new(),
            delete_after_migration: false,
            lock_ttl_secs: default_lock_ttl_secs(),
            indices: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, apply environment overrides, and
    /// validate.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file without validation.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            source: e,
        })?;
        toml::from_str(&contents).map_err(|e| ConfigError::Toml { path, source: e })
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(listen) = std::env::var("OQBRIDGE_LISTEN") {
            self.server.listen = listen;
        }
        if let Ok(url) = std::env::var("OQBRIDGE_HOT_URL") {
            self.hot_store.url = url;
        }
        if let Ok(user) = std::env::var("OQBRIDGE_HOT_USERNAME") {
            self.hot_store.username = user;
        }
        if let Ok(pass) = std::env::var("OQBRIDGE_HOT_PASSWORD") {
            self.hot_store.password = pass;
        }
        if let Ok(url) = std::env::var("OQBRIDGE_COLD_URL") {
            self.cold_store.url = url;
        }
        if let Ok(user) = std::env::var("OQBRIDGE_COLD_USERNAME") {
            self.cold_store.username = user;
        }
        if let Ok(pass) = std::env::var("OQBRIDGE_COLD_PASSWORD") {
            self.cold_store.password = pass;
        }
        if let Ok(level) = std::env::var("OQBRIDGE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("OQBRIDGE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hot_store.url.is_empty() {
            return Err(ConfigError::Validation(
                "hot_store.url is required".to_string(),
            ));
        }
        url::Url::parse(&self.hot_store.url)
            .map_err(|e| ConfigError::Validation(format!("invalid hot_store.url: {e}")))?;

        if self.cold_store.url.is_empty() {
            return Err(ConfigError::Validation(
                "cold_store.url is required".to_string(),
            ));
        }
        url::Url::parse(&self.cold_store.url)
            .map_err(|e| ConfigError::Validation(format!("invalid cold_store.url: {e}")))?;

        if self.retention.hot_days < 1 {
            return Err(ConfigError::Validation(
                "retention.hot_days must be >= 1".to_string(),
            ));
        }

        if self.migration.migrate_after_days < 1 {
            return Err(ConfigError::Validation(
                "migration.migrate_after_days must be >= 1".to_string(),
            ));
        }
        // Documents must age out of the query hot window only after they have
        // been copied to the cold store, never before.
        if self.migration.migrate_after_days >= self.retention.hot_days {
            return Err(ConfigError::Validation(format!(
                "migration.migrate_after_days ({}) must be < retention.hot_days ({})",
                self.migration.migrate_after_days, self.retention.hot_days
            )));
        }

        if self.migration.workers == 0 {
            return Err(ConfigError::Validation(
                "migration.workers must be >= 1".to_string(),
            ));
        }
        if self.migration.batch_size == 0 {
            return Err(ConfigError::Validation(
                "migration.batch_size must be >= 1".to_string(),
            ));
        }

        for over in &self.retention.cold_overrides {
            Glob::new(&over.pattern).map_err(|e| {
                ConfigError::Validation(format!(
                    "invalid retention.cold_overrides pattern {:?}: {e}",
                    over.pattern
                ))
            })?;
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of: {}",
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.format must be one of: {}",
                valid_formats.join(", ")
            )));
        }

        Ok(())
    }

    /// Returns the timestamp field for the given index, falling back to the
    /// global default when no per-index override is configured.
    #[must_use]
    pub fn timestamp_field_for(&self, index: &str) -> &str {
        self.retention
            .index_fields
            .get(index)
            .map_or(&self.retention.timestamp_field, String::as_str)
    }

    /// Returns the cold-store retention in days for the given index. The
    /// first matching override pattern wins; otherwise the global
    /// `retention.cold_days` applies. 0 means keep forever.
    #[must_use]
    pub fn cold_days_for(&self, index: &str) -> i64 {
        for over in &self.retention.cold_overrides {
            if let Ok(glob) = Glob::new(&over.pattern) {
                if glob.compile_matcher().is_match(index) {
                    return over.days;
                }
            }
        }
        self.retention.cold_days
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading the configuration file.
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML in {path:?}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Validation error.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}
