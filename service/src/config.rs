use std::net::IpAddr;

use eh_crypto::SecretSealer;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_aux::prelude::deserialize_vec_from_string_or_vec;

/// Application configuration loaded from multiple sources.
///
/// Configuration is loaded in priority order (lowest to highest):
/// 1. Struct defaults
/// 2. config.yaml file (if exists)
/// 3. Environment variables with EH_ prefix (always wins)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub edge_auth: EdgeAuthConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database host.
    #[serde(default = "default_db_host")]
    pub host: String,

    /// Database port.
    #[serde(default = "default_db_port")]
    pub port: u16,

    /// Database name.
    #[serde(default = "default_db_name")]
    pub name: String,

    /// Database user (required, no compiled-in default).
    #[serde(default)]
    pub user: String,

    /// Database password (required, no compiled-in default).
    #[serde(default)]
    pub password: String,

    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Optional custom migrations directory path.
    pub migrations_dir: Option<String>,
}

impl DatabaseConfig {
    /// Assemble a `PostgreSQL` connection URL from individual fields.
    #[must_use]
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name
        )
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// HTTP server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// HTTP server bind address.
    #[serde(default = "default_host")]
    pub host: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log filter directive (e.g. `info`, `edgehub_api=debug,tower_http=info`).
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Edge device request authentication.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EdgeAuthConfig {
    /// Maximum allowed distance between the request timestamp and server
    /// time, in seconds. Applies to past and future timestamps alike.
    #[serde(default = "default_timestamp_tolerance_secs")]
    pub timestamp_tolerance_secs: i64,

    /// Age after which nonce ledger rows are purged, in seconds.
    /// Must be at least twice `timestamp_tolerance_secs`: a request stamped
    /// `tolerance` seconds ahead of its reservation stays fresh for
    /// `2 * tolerance` seconds after it.
    #[serde(default = "default_nonce_retention_secs")]
    pub nonce_retention_secs: i64,

    /// Interval between nonce purge sweeps, in seconds.
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,

    /// Largest request body buffered for signature verification.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Base64url master key (32 bytes) that seals credential secrets at rest.
    /// Required. Set via `EH_EDGE_AUTH__SECRET_KEY`.
    #[serde(default)]
    pub secret_key: String,

    /// Proxy addresses whose `X-Forwarded-For` header is trusted for the
    /// request origin. Accepts an array or a comma-separated string.
    #[serde(default, deserialize_with = "deserialize_trusted_proxies")]
    pub trusted_proxies: Vec<String>,
}

impl EdgeAuthConfig {
    /// Parse `trusted_proxies` into addresses, skipping entries that do not parse.
    /// [`Config::validate`] rejects such entries up front.
    #[must_use]
    pub fn trusted_proxy_addrs(&self) -> Vec<IpAddr> {
        self.trusted_proxies
            .iter()
            .filter_map(|p| p.parse().ok())
            .collect()
    }
}

/// Deserialize proxies from comma-separated string or array, filtering empty values.
fn deserialize_trusted_proxies<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let proxies: Vec<String> = deserialize_vec_from_string_or_vec(deserializer)?;
    Ok(proxies
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

// These functions cannot be const because serde uses function pointers for defaults
#[allow(clippy::missing_const_for_fn)]
fn default_max_connections() -> u32 {
    10
}

#[allow(clippy::missing_const_for_fn)]
fn default_port() -> u16 {
    8080
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_db_host() -> String {
    "localhost".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_db_port() -> u16 {
    5432
}

fn default_db_name() -> String {
    "edgehub".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_timestamp_tolerance_secs() -> i64 {
    300
}

#[allow(clippy::missing_const_for_fn)]
fn default_nonce_retention_secs() -> i64 {
    600 // 2x the freshness window
}

#[allow(clippy::missing_const_for_fn)]
fn default_purge_interval_secs() -> u64 {
    60
}

#[allow(clippy::missing_const_for_fn)]
fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for EdgeAuthConfig {
    fn default() -> Self {
        Self {
            timestamp_tolerance_secs: default_timestamp_tolerance_secs(),
            nonce_retention_secs: default_nonce_retention_secs(),
            purge_interval_secs: default_purge_interval_secs(),
            max_body_bytes: default_max_body_bytes(),
            secret_key: String::new(),
            trusted_proxies: Vec::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                host: default_db_host(),
                port: default_db_port(),
                name: default_db_name(),
                user: String::new(),
                password: String::new(),
                max_connections: default_max_connections(),
                migrations_dir: None,
            },
            server: ServerConfig {
                port: default_port(),
                host: default_host(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
            },
            edge_auth: EdgeAuthConfig::default(),
        }
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Sources are merged in priority order:
    /// 1. Struct defaults (lowest)
    /// 2. config.yaml file (if exists)
    /// 3. Environment variables with EH_ prefix (highest)
    ///
    /// # Errors
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config.yaml")
    }

    /// Load configuration with a custom YAML file path.
    ///
    /// # Errors
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load_from(yaml_path: &str) -> Result<Self, ConfigError> {
        let config: Self = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Yaml::file(yaml_path))
            .merge(Env::prefixed("EH_").split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.user.is_empty() {
            return Err(ConfigError::Validation(
                "database.user is required. Set EH_DATABASE__USER environment variable or configure in config.yaml.".into(),
            ));
        }

        if self.database.password.is_empty() {
            return Err(ConfigError::Validation(
                "database.password is required. Set EH_DATABASE__PASSWORD environment variable or configure in config.yaml.".into(),
            ));
        }

        if self.database.port == 0 {
            return Err(ConfigError::Validation(
                "database.port cannot be 0".into(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port cannot be 0".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections cannot be 0".into(),
            ));
        }

        self.edge_auth.validate()
    }
}

impl EdgeAuthConfig {
    /// Validate the edge authentication section.
    ///
    /// # Errors
    /// Returns an error if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret_key.is_empty() {
            return Err(ConfigError::Validation(
                "edge_auth.secret_key is required. Set EH_EDGE_AUTH__SECRET_KEY environment variable or configure in config.yaml.".into(),
            ));
        }

        if let Err(e) = SecretSealer::from_base64url(&self.secret_key) {
            return Err(ConfigError::Validation(format!(
                "edge_auth.secret_key is unusable: {e}"
            )));
        }

        if self.timestamp_tolerance_secs <= 0 {
            return Err(ConfigError::Validation(
                "edge_auth.timestamp_tolerance_secs must be positive".into(),
            ));
        }

        // Purging a nonce while its timestamp can still pass the freshness
        // check would let the request be replayed.
        let min_retention = self.timestamp_tolerance_secs.saturating_mul(2);
        if self.nonce_retention_secs < min_retention {
            return Err(ConfigError::Validation(format!(
                "edge_auth.nonce_retention_secs ({}) must be at least twice edge_auth.timestamp_tolerance_secs ({})",
                self.nonce_retention_secs, self.timestamp_tolerance_secs
            )));
        }

        if self.purge_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "edge_auth.purge_interval_secs cannot be 0".into(),
            ));
        }

        if self.max_body_bytes == 0 {
            return Err(ConfigError::Validation(
                "edge_auth.max_body_bytes cannot be 0".into(),
            ));
        }

        for proxy in &self.trusted_proxies {
            if proxy.parse::<IpAddr>().is_err() {
                return Err(ConfigError::Validation(format!(
                    "edge_auth.trusted_proxies contains invalid address '{proxy}'"
                )));
            }
        }

        Ok(())
    }
}
