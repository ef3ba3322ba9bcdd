pub mod database;
pub mod server;

use anyhow::Result;
use dotenvy::dotenv;
use std::env;

pub use database::DatabaseConfig;
pub use server::ServerConfig;

use crate::core::Currency;

/// Hot-store migration worker settings
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Events fetched from the hot store per batch
    pub batch_size: i64,
    /// Batches processed per worker run
    pub max_batches: u32,
    /// Days processed events are retained in the hot store before purge
    pub retention_days: i64,
}

/// Payment retry scheduler settings
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub enabled: bool,
    pub max_retries: i32,
    pub base_interval_hours: i64,
}

/// Payment gateway credentials and endpoint
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub key_id: String,
    pub secret: String,
    pub webhook_secret: String,
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub env: String,
    pub log_level: String,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub migration: MigrationConfig,
    pub retry: RetryConfig,
    pub gateway: GatewayConfig,
    pub default_currency: Currency,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: &str) -> Result<T> {
    env_or(key, default)
        .parse()
        .map_err(|_| anyhow::anyhow!("{} must be a valid value", key))
}

impl Config {
    /// Load configuration from environment variables
    /// Validates all required variables are present
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenv().ok();

        Ok(Self {
            env: env_or("APP_ENV", "development"),
            log_level: env_or("LOG_LEVEL", "info"),
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            migration: MigrationConfig {
                batch_size: env_parse("MIGRATION_BATCH_SIZE", "1000")?,
                max_batches: env_parse("MIGRATION_MAX_BATCHES", "10")?,
                retention_days: env_parse("HOT_RETENTION_DAYS", "7")?,
            },
            retry: RetryConfig {
                enabled: env_parse("PAYMENT_RETRY_ENABLED", "true")?,
                max_retries: env_parse("PAYMENT_RETRY_MAX_RETRIES", "3")?,
                base_interval_hours: env_parse("PAYMENT_RETRY_BASE_INTERVAL_HOURS", "24")?,
            },
            gateway: GatewayConfig {
                base_url: env_or("GATEWAY_BASE_URL", "https://api.razorpay.com"),
                key_id: env::var("GATEWAY_KEY_ID")
                    .map_err(|_| anyhow::anyhow!("GATEWAY_KEY_ID environment variable is required"))?,
                secret: env::var("GATEWAY_SECRET")
                    .map_err(|_| anyhow::anyhow!("GATEWAY_SECRET environment variable is required"))?,
                webhook_secret: env::var("GATEWAY_WEBHOOK_SECRET").map_err(|_| {
                    anyhow::anyhow!("GATEWAY_WEBHOOK_SECRET environment variable is required")
                })?,
            },
            default_currency: env_or("DEFAULT_CURRENCY", "INR")
                .parse()
                .map_err(|e| anyhow::anyhow!("DEFAULT_CURRENCY: {}", e))?,
        })
    }

    /// Sanity-check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.migration.batch_size <= 0 {
            anyhow::bail!("MIGRATION_BATCH_SIZE must be positive");
        }
        if self.migration.max_batches == 0 {
            anyhow::bail!("MIGRATION_MAX_BATCHES must be positive");
        }
        if self.migration.retention_days < 1 {
            anyhow::bail!("HOT_RETENTION_DAYS must be at least 1");
        }
        if self.retry.max_retries < 0 {
            anyhow::bail!("PAYMENT_RETRY_MAX_RETRIES must be non-negative");
        }
        if self.retry.base_interval_hours <= 0 {
            anyhow::bail!("PAYMENT_RETRY_BASE_INTERVAL_HOURS must be positive");
        }
        Ok(())
    }
}
