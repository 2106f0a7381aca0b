use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const CONFIG_DIR: &str = "config";

/// Application configuration.
///
/// Sourced from `config/default.toml`, an optional per-environment file, and
/// `PARTSHOP_`-prefixed environment variables, in that precedence order.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL (postgres or sqlite)
    #[validate(length(min = 1, message = "Database URL must not be empty"))]
    pub database_url: String,

    /// Maximum database pool connections
    #[serde(default = "default_max_connections")]
    pub db_max_connections: u32,

    /// Minimum database pool connections
    #[serde(default = "default_min_connections")]
    pub db_min_connections: u32,

    /// Runtime environment name (development, test, production)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Log filter directive (e.g. "info", "partshop_api=debug")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Capacity of the in-process event channel
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_min_connections() -> u32 {
    DEFAULT_MIN_CONNECTIONS
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_event_channel_capacity() -> usize {
    100
}

impl AppConfig {
    /// Constructs a configuration directly, bypassing file/env layering.
    /// Primarily used by tests.
    pub fn new(database_url: String, environment: String) -> Self {
        Self {
            database_url,
            db_max_connections: DEFAULT_MAX_CONNECTIONS,
            db_min_connections: DEFAULT_MIN_CONNECTIONS,
            environment,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    /// Loads configuration from files and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("PARTSHOP_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

        let config = Config::builder()
            .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
            .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, env)).required(false))
            .add_source(Environment::with_prefix("PARTSHOP"))
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;

        app_config
            .validate()
            .map_err(|e| ConfigError::Message(format!("Invalid configuration: {}", e)))?;

        info!(environment = %app_config.environment, "Configuration loaded");
        Ok(app_config)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
