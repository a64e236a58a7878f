use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Name of the durable Postgres-backed connection
pub const DATABASE_CONNECTION: &str = "database";
/// Name of the connection that runs jobs in-process at push time
pub const SYNC_CONNECTION: &str = "sync";
/// Name of the in-process test double
pub const MEMORY_CONNECTION: &str = "memory";

#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: Option<String>,
    pub max_connections: u32,

    // Queue
    pub default_connection: String,
    pub reservation_timeout_secs: u64,

    // Worker
    pub poll_interval_ms: u64,
    pub max_attempts: u32,
    pub retry_delay_secs: u64,

    // Server
    pub host: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 10,
            default_connection: DATABASE_CONNECTION.to_string(),
            reservation_timeout_secs: 300,
            poll_interval_ms: 1000,
            max_attempts: 3,
            retry_delay_secs: 0,
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if exists

        let defaults = Self::default();

        // Debug mode forces every default resolution onto the sync connection
        let debug: bool = parse_var("QUEUE_DEBUG", false)?;
        let default_connection = if debug {
            SYNC_CONNECTION.to_string()
        } else {
            env::var("QUEUE_CONNECTION")
                .ok()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(defaults.default_connection)
        };

        Ok(Self {
            // Database
            database_url: env::var("DATABASE_URL").ok(),
            max_connections: parse_var("QUEUE_MAX_CONNECTIONS", defaults.max_connections)?,

            // Queue
            default_connection,
            reservation_timeout_secs: parse_var(
                "QUEUE_RESERVATION_TIMEOUT_SECS",
                defaults.reservation_timeout_secs,
            )?,

            // Worker
            poll_interval_ms: parse_var("WORKER_POLL_INTERVAL_MS", defaults.poll_interval_ms)?,
            max_attempts: parse_var("WORKER_MAX_ATTEMPTS", defaults.max_attempts)?,
            retry_delay_secs: parse_var("WORKER_RETRY_DELAY_SECS", defaults.retry_delay_secs)?,

            // Server
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT", defaults.port)?,
        })
    }

    /// Get server address as "host:port"
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn reservation_timeout(&self) -> Duration {
        Duration::from_secs(self.reservation_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid environment variable: {0}")]
    Invalid(&'static str),
}

impl From<ConfigError> for crate::error::QueueError {
    fn from(err: ConfigError) -> Self {
        crate::error::QueueError::Config(err.to_string())
    }
}
