//! Configuration management.
//!
//! Values come from an optional file named by `TASKGATE_CONFIG` and from
//! `TASKGATE__*` environment variables (double underscore separates sections,
//! e.g. `TASKGATE__AUTH__JWT_SECRET`). [`Config::load`] validates the result
//! and refuses to start with an unusable signing secret.

use serde::Deserialize;

use crate::error::{Result, TaskgateError};
use crate::telemetry::{LoggingConfig, MetricsConfig};

/// Environment variable prefix for all settings.
pub const ENV_PREFIX: &str = "TASKGATE";

/// Environment variable naming an optional configuration file.
pub const CONFIG_PATH_ENV: &str = "TASKGATE_CONFIG";

/// Minimum accepted length of the HMAC signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Upper bound for token lifetimes (30 days).
pub const MAX_TOKEN_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Well-known sample secrets that must never sign production tokens.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "your-secret-key",
    "secret",
    "changeme",
    "change-me",
    "jwt-secret",
];

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Persistent store configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Token and credential configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
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

/// Which [`Store`](crate::db::Store) implementation backs the service.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgres,
    /// Process-local maps; state is lost on restart.
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Store implementation
    #[serde(default)]
    pub backend: StoreBackend,

    /// PostgreSQL connection URL
    #[serde(default)]
    pub url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC-SHA256 secret for access tokens
    #[serde(default)]
    pub jwt_secret: String,

    /// Access token lifetime in seconds
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl_secs: u64,

    /// Refresh token lifetime in seconds
    #[serde(default = "default_refresh_token_ttl")]
    pub refresh_token_ttl_secs: u64,

    /// Interval between expired refresh token sweeps
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,

    /// Argon2id cost parameters
    #[serde(default)]
    pub password_hashing: PasswordHashingConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            access_token_ttl_secs: default_access_token_ttl(),
            refresh_token_ttl_secs: default_refresh_token_ttl(),
            cleanup_interval_secs: default_cleanup_interval(),
            password_hashing: PasswordHashingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct PasswordHashingConfig {
    /// Memory cost in KiB
    #[serde(default = "default_argon2_memory")]
    pub memory_kib: u32,

    /// Number of passes
    #[serde(default = "default_argon2_iterations")]
    pub iterations: u32,

    /// Degree of parallelism
    #[serde(default = "default_argon2_parallelism")]
    pub parallelism: u32,
}

impl Default for PasswordHashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_argon2_memory(),
            iterations: default_argon2_iterations(),
            parallelism: default_argon2_parallelism(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Deployment environment (development, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// OpenTelemetry OTLP endpoint
    pub otlp_endpoint: Option<String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            otlp_endpoint: None,
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_access_token_ttl() -> u64 { 3600 }
fn default_refresh_token_ttl() -> u64 { 3600 }
fn default_cleanup_interval() -> u64 { 300 }
fn default_argon2_memory() -> u32 { 19_456 }
fn default_argon2_iterations() -> u32 { 2 }
fn default_argon2_parallelism() -> u32 { 1 }
fn default_environment() -> String { "development".to_string() }

impl Config {
    /// Load configuration from environment and the optional config file, then validate it.
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(config::File::with_name(&path));
        }
        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a specific file path, with environment overrides.
    pub fn from_file(path: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations the service must not start with.
    pub fn validate(&self) -> Result<()> {
        self.auth.validate()?;

        if self.database.backend == StoreBackend::Postgres
            && self.database.url.as_deref().map_or(true, str::is_empty)
        {
            return Err(TaskgateError::configuration(
                "database.url is required for the postgres backend",
            ));
        }

        Ok(())
    }
}

impl AuthConfig {
    pub fn validate(&self) -> Result<()> {
        let secret = self.jwt_secret.trim();
        if secret.is_empty() {
            return Err(TaskgateError::configuration("auth.jwt_secret is not set"));
        }
        if PLACEHOLDER_SECRETS
            .iter()
            .any(|p| secret.eq_ignore_ascii_case(p))
        {
            return Err(TaskgateError::configuration(
                "auth.jwt_secret is a well-known placeholder",
            ));
        }
        if secret.len() < MIN_SECRET_LEN {
            return Err(TaskgateError::configuration(format!(
                "auth.jwt_secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        if self.access_token_ttl_secs == 0 || self.refresh_token_ttl_secs == 0 {
            return Err(TaskgateError::configuration("token lifetimes must be positive"));
        }
        if self.access_token_ttl_secs > MAX_TOKEN_TTL_SECS
            || self.refresh_token_ttl_secs > MAX_TOKEN_TTL_SECS
        {
            return Err(TaskgateError::configuration(format!(
                "token lifetimes must not exceed {} seconds",
                MAX_TOKEN_TTL_SECS
            )));
        }
        if self.cleanup_interval_secs == 0 {
            return Err(TaskgateError::configuration(
                "auth.cleanup_interval_secs must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn config_with_secret(secret: &str) -> Config {
        Config {
            server: ServerConfig::default(),
            database: DatabaseConfig {
                backend: StoreBackend::Memory,
                ..DatabaseConfig::default()
            },
            auth: AuthConfig {
                jwt_secret: secret.to_string(),
                ..AuthConfig::default()
            },
            observability: ObservabilityConfig::default(),
        }
    }

    #[test]
    fn test_defaults() {
        let auth = AuthConfig::default();
        assert_eq!(auth.access_token_ttl_secs, 3600);
        assert_eq!(auth.refresh_token_ttl_secs, 3600);
        assert_eq!(DatabaseConfig::default().backend, StoreBackend::Postgres);
    }

    #[test]
    fn test_missing_secret_rejected() {
        let err = config_with_secret("").validate().unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfiguration);
    }

    #[test]
    fn test_placeholder_secret_rejected() {
        let err = config_with_secret("your-secret-key").validate().unwrap_err();
        assert!(err.user_message().contains("placeholder"));
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(config_with_secret("too-short").validate().is_err());
    }

    #[test]
    fn test_strong_secret_accepted() {
        let config = config_with_secret("0123456789abcdef0123456789abcdef");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_token_lifetime_bounds() {
        let mut config = config_with_secret("0123456789abcdef0123456789abcdef");
        config.auth.access_token_ttl_secs = MAX_TOKEN_TTL_SECS;
        assert!(config.validate().is_ok());

        config.auth.access_token_ttl_secs = u64::MAX;
        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfiguration);

        config.auth.access_token_ttl_secs = 900;
        config.auth.refresh_token_ttl_secs = MAX_TOKEN_TTL_SECS + 1;
        assert!(config.validate().is_err());

        config.auth.refresh_token_ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_postgres_requires_url() {
        let mut config = config_with_secret("0123456789abcdef0123456789abcdef");
        config.database.backend = StoreBackend::Postgres;
        assert!(config.validate().is_err());

        config.database.url = Some("postgres://localhost/taskgate".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_from_toml() {
        let raw = r#"
            [database]
            backend = "memory"

            [auth]
            jwt_secret = "0123456789abcdef0123456789abcdef"
            access_token_ttl_secs = 900
        "#;
        let cfg: Config = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.database.backend, StoreBackend::Memory);
        assert_eq!(cfg.auth.access_token_ttl_secs, 900);
        assert_eq!(cfg.auth.refresh_token_ttl_secs, 3600);
        assert!(cfg.validate().is_ok());
    }
}
