//! Configuration management for the Verdex seed inventory server
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with VERDEX_ prefix
//!
//! Nested keys are joined with a double underscore after the prefix, so
//! `server.port` is set by `VERDEX_SERVER__PORT=8080` and `store.database_url`
//! by `VERDEX_STORE__DATABASE_URL=postgres://...`.

use config::{ConfigError, Environment, File, Map};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Ledger store backend selection
    pub store: StoreConfig,

    /// Transaction retry policy
    pub ledger: LedgerConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// PostgreSQL connection URL, required when `backend = "postgres"`
    #[serde(default)]
    pub database_url: Option<String>,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    /// Attempts per transaction before reporting a conflict
    pub max_attempts: u32,

    pub attempt_timeout_ms: u64,

    /// Initial retry delay, doubled after every conflict
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for verifying bearer tokens
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    /// Emit JSON log lines instead of human-readable ones
    pub json: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("VERDEX_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = Self::defaults(config::Config::builder(), &environment)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (VERDEX_ prefix)
            .add_source(Self::environment(None))
            .build()?;

        config.try_deserialize()
    }

    /// `source` replaces the process environment when given
    fn environment(source: Option<Map<String, String>>) -> Environment {
        Environment::with_prefix("VERDEX")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(source)
    }

    fn defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        environment: &str,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("environment", environment)?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("store.backend", "memory")?
            .set_default("store.max_connections", 10)?
            .set_default("store.min_connections", 2)?
            .set_default("ledger.max_attempts", 10)?
            .set_default("ledger.attempt_timeout_ms", 5000)?
            .set_default("ledger.retry_backoff_ms", 5)?
            .set_default("jwt.secret", "development-secret-key")?
            .set_default("log.json", false)
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            attempt_timeout_ms: 5000,
            retry_backoff_ms: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_deserialize() {
        let config: Config = Config::defaults(config::Config::builder(), "test")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.environment, "test");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert!(config.store.database_url.is_none());
        assert_eq!(config.ledger.max_attempts, 10);
        assert!(!config.log.json);
        assert!(!config.is_development());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let config: Config = Config::defaults(config::Config::builder(), "production")
            .unwrap()
            .set_override("store.backend", "postgres")
            .unwrap()
            .set_override("store.database_url", "postgres://localhost/verdex")
            .unwrap()
            .set_override("ledger.max_attempts", 3)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.store.backend, StoreBackend::Postgres);
        assert_eq!(config.store.database_url.as_deref(), Some("postgres://localhost/verdex"));
        assert_eq!(config.ledger.max_attempts, 3);
    }

    #[test]
    fn test_environment_keys_use_double_underscore_for_nesting() {
        let vars: Map<String, String> = [
            ("VERDEX_SERVER__PORT", "8080"),
            ("VERDEX_STORE__BACKEND", "postgres"),
            ("VERDEX_STORE__DATABASE_URL", "postgres://db/verdex"),
            ("VERDEX_LOG__JSON", "true"),
            ("OTHER_SERVER__PORT", "9999"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config: Config = Config::defaults(config::Config::builder(), "test")
            .unwrap()
            .add_source(Config::environment(Some(vars)))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.store.backend, StoreBackend::Postgres);
        assert_eq!(config.store.database_url.as_deref(), Some("postgres://db/verdex"));
        assert!(config.log.json);
    }
}
