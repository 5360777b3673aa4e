// Centralized configuration management for the redirect core
// JavaScript-style config pattern - Load ALL env vars ONCE at startup

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Global application configuration loaded once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(|| {
    #[cfg(test)]
    dotenv::dotenv().ok();

    AppConfig::from_env().expect("Failed to load configuration")
});

pub fn config() -> &'static AppConfig {
    &CONFIG
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub clickhouse: ClickHouseConfig,
    pub cache: CacheConfig,
    pub pipeline: PipelineConfig,
    pub bot: BotConfig,
    pub webhook: WebhookConfig,
    pub realtime: RealtimeConfig,

    // Flattened read-shortcuts used throughout, alongside the nested sections above
    pub database_url: String,
    pub redis_url: String,
    pub clickhouse_url: String,
    pub clickhouse_database: String,
    pub clickhouse_user: String,
    pub clickhouse_password: String,
    pub environment: Environment,
    pub cors_allowed_origins: Vec<String>,
    pub platform_default_domain: String,
    pub enable_metrics: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub environment: Environment,
    pub trusted_proxy_header: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Environment {
    Development,
    Test,
    Staging,
    Production,
}

impl From<String> for Environment {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            "test" => Environment::Test,
            "staging" | "stage" => Environment::Staging,
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: u64,
    pub idle_timeout: u64,
    pub max_lifetime: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub pool_size: u32,
    pub connection_timeout: u64,
    pub command_timeout: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub idle_timeout: u64,
    pub max_lifetime: u64,
    pub invalidation_channel: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickHouseConfig {
    pub url: String,
    pub database: String,
    pub user: String,
    pub password: String,
}

/// Cache tier configuration (L1 in-process, L2 shared)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub l1_max_bytes: u64,
    pub l1_ttl_secs: u64,
    pub l1_shards: usize,
    pub l1_sweep_interval_secs: u64,
    pub l1_max_entry_bytes: usize,
    pub l2_ttl_secs: u64,
}

impl CacheConfig {
    pub fn l1_ttl(&self) -> Duration {
        Duration::from_secs(self.l1_ttl_secs)
    }
    pub fn l2_ttl(&self) -> Duration {
        Duration::from_secs(self.l2_ttl_secs)
    }
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.l1_sweep_interval_secs)
    }
}

/// Click pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub workers: usize,
    pub buffer: usize,
    pub batch_size: usize,
    pub flush_period_ms: u64,
    pub write_timeout_secs: u64,
}

impl PipelineConfig {
    pub fn flush_period(&self) -> Duration {
        Duration::from_millis(self.flush_period_ms)
    }
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub cache_size: usize,
    pub min_ua_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub max_attempts: u32,
    pub initial_delay_secs: u64,
    pub multiplier: f64,
    pub max_delay_secs: u64,
    pub auto_disable_threshold: u32,
    pub auto_disable_window_secs: u64,
    pub delivery_timeout_secs: u64,
    pub retry_poll_interval_secs: u64,
}

impl WebhookConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }
    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    pub subscriber_buffer: usize,
    pub ping_interval_secs: u64,
    pub idle_timeout_secs: u64,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let get_required = |key: &str| -> Result<String, ConfigError> {
            env::var(key).map_err(|_| ConfigError::MissingVar(key.to_string()))
        };
        let get_or_default = |key: &str, default: &str| -> String {
            env::var(key).unwrap_or_else(|_| default.to_string())
        };
        let parse_or_default = |key: &str, default: &str| -> Result<u32, ConfigError> {
            get_or_default(key, default).parse().map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), "not a valid u32".to_string())
            })
        };
        let parse_u64_or_default = |key: &str, default: &str| -> Result<u64, ConfigError> {
            get_or_default(key, default).parse().map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), "not a valid u64".to_string())
            })
        };
        let parse_usize_or_default = |key: &str, default: &str| -> Result<usize, ConfigError> {
            get_or_default(key, default).parse().map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), "not a valid usize".to_string())
            })
        };
        let parse_f64_or_default = |key: &str, default: &str| -> Result<f64, ConfigError> {
            get_or_default(key, default).parse().map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), "not a valid f64".to_string())
            })
        };
        let parse_bool_or_default = |key: &str, default: &str| -> bool {
            get_or_default(key, default).to_lowercase() == "true"
        };

        let bind_address = get_or_default("BIND_ADDRESS", "0.0.0.0:8080");
        let port = bind_address
            .rsplit(':')
            .next()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let environment_str = get_or_default("ENVIRONMENT", "development");
        let environment = Environment::from(environment_str);

        let database_url = get_required("DATABASE_URL")?;
        let redis_url = get_or_default("REDIS_URL", "redis://localhost:6379");
        let clickhouse_url = get_or_default("CLICKHOUSE_URL", "http://localhost:8123");
        let clickhouse_database = get_or_default("CLICKHOUSE_DB", "redirect_analytics");
        let clickhouse_user = get_or_default("CLICKHOUSE_USER", "default");
        let clickhouse_password = get_or_default("CLICKHOUSE_PASSWORD", "");

        let cors_allowed_origins = get_or_default("CORS_ALLOWED_ORIGINS", "*")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            server: ServerConfig {
                bind_address: bind_address.clone(),
                port,
                environment: environment.clone(),
                trusted_proxy_header: env::var("TRUSTED_PROXY_HEADER").ok(),
            },
            database: DatabaseConfig {
                url: database_url.clone(),
                max_connections: parse_or_default("DATABASE_MAX_CONNECTIONS", "20")?,
                min_connections: parse_or_default("DATABASE_MIN_CONNECTIONS", "5")?,
                connect_timeout: parse_u64_or_default("DATABASE_CONNECT_TIMEOUT", "10")?,
                idle_timeout: parse_u64_or_default("DATABASE_IDLE_TIMEOUT", "1800")?,
                max_lifetime: parse_u64_or_default("DATABASE_MAX_LIFETIME", "3600")?,
            },
            redis: RedisConfig {
                url: redis_url.clone(),
                pool_size: parse_or_default("REDIS_POOL_SIZE", "50")?,
                connection_timeout: parse_u64_or_default("REDIS_CONNECTION_TIMEOUT", "5")?,
                command_timeout: parse_u64_or_default("REDIS_COMMAND_TIMEOUT", "5")?,
                retry_attempts: parse_or_default("REDIS_RETRY_ATTEMPTS", "3")?,
                retry_delay_ms: parse_u64_or_default("REDIS_RETRY_DELAY_MS", "100")?,
                idle_timeout: parse_u64_or_default("REDIS_IDLE_TIMEOUT", "300")?,
                max_lifetime: parse_u64_or_default("REDIS_MAX_LIFETIME", "3600")?,
                invalidation_channel: get_or_default(
                    "CACHE_INVALIDATION_CHANNEL",
                    "link:invalidate",
                ),
            },
            clickhouse: ClickHouseConfig {
                url: clickhouse_url.clone(),
                database: clickhouse_database.clone(),
                user: clickhouse_user.clone(),
                password: clickhouse_password.clone(),
            },
            cache: CacheConfig {
                l1_max_bytes: parse_u64_or_default("CACHE_L1_MAX_BYTES", "1073741824")?,
                l1_ttl_secs: parse_u64_or_default("CACHE_L1_TTL_SECS", "300")?,
                l1_shards: parse_usize_or_default("CACHE_L1_SHARDS", "1024")?,
                l1_sweep_interval_secs: parse_u64_or_default("CACHE_L1_SWEEP_SECS", "300")?,
                l1_max_entry_bytes: parse_usize_or_default("CACHE_L1_MAX_ENTRY_BYTES", "8192")?,
                l2_ttl_secs: parse_u64_or_default("CACHE_L2_TTL_SECS", "3600")?,
            },
            pipeline: PipelineConfig {
                workers: parse_usize_or_default("PIPELINE_WORKERS", "16")?,
                buffer: parse_usize_or_default("PIPELINE_BUFFER", "100000")?,
                batch_size: parse_usize_or_default("PIPELINE_BATCH_SIZE", "1000")?,
                flush_period_ms: parse_u64_or_default("PIPELINE_FLUSH_PERIOD_MS", "1000")?,
                write_timeout_secs: parse_u64_or_default("PIPELINE_WRITE_TIMEOUT_SECS", "10")?,
            },
            bot: BotConfig {
                cache_size: parse_usize_or_default("BOT_CACHE_SIZE", "10000")?,
                min_ua_length: parse_usize_or_default("BOT_MIN_UA_LENGTH", "20")?,
            },
            webhook: WebhookConfig {
                max_attempts: parse_or_default("WEBHOOK_MAX_ATTEMPTS", "5")?,
                initial_delay_secs: parse_u64_or_default("WEBHOOK_INITIAL_DELAY_SECS", "30")?,
                multiplier: parse_f64_or_default("WEBHOOK_BACKOFF_MULTIPLIER", "2.0")?,
                max_delay_secs: parse_u64_or_default("WEBHOOK_MAX_DELAY_SECS", "86400")?,
                auto_disable_threshold: parse_or_default("WEBHOOK_AUTO_DISABLE_THRESHOLD", "10")?,
                auto_disable_window_secs: parse_u64_or_default(
                    "WEBHOOK_AUTO_DISABLE_WINDOW_SECS",
                    "86400",
                )?,
                delivery_timeout_secs: parse_u64_or_default("WEBHOOK_DELIVERY_TIMEOUT_SECS", "30")?,
                retry_poll_interval_secs: parse_u64_or_default(
                    "WEBHOOK_RETRY_POLL_INTERVAL_SECS",
                    "10",
                )?,
            },
            realtime: RealtimeConfig {
                subscriber_buffer: parse_usize_or_default("REALTIME_SUBSCRIBER_BUFFER", "256")?,
                ping_interval_secs: parse_u64_or_default("REALTIME_PING_INTERVAL_SECS", "30")?,
                idle_timeout_secs: parse_u64_or_default("REALTIME_IDLE_TIMEOUT_SECS", "90")?,
            },
            database_url,
            redis_url,
            clickhouse_url,
            clickhouse_database,
            clickhouse_user,
            clickhouse_password,
            environment,
            cors_allowed_origins,
            platform_default_domain: get_or_default("PLATFORM_DEFAULT_DOMAIN", "short.link"),
            enable_metrics: parse_bool_or_default("ENABLE_METRICS", "true"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_from_string_defaults_to_development() {
        assert_eq!(Environment::from("bogus".to_string()), Environment::Development);
        assert_eq!(Environment::from("production".to_string()), Environment::Production);
    }
}
