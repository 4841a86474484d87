use config::{Config, ConfigError, Environment};
use once_cell::sync::Lazy;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub vendor: VendorConfig,
    #[serde(default)]
    pub price: PriceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VendorConfig {
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceConfig {
    /// Maximum age of a cached price before a vendor refresh is forced.
    #[serde(default = "default_freshness_secs")]
    pub freshness_secs: i64,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            freshness_secs: default_freshness_secs(),
        }
    }
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_freshness_secs() -> i64 {
    300
}

pub static CONFIG: Lazy<AppConfig> = Lazy::new(|| {
    dotenvy::dotenv().ok();
    load().expect("invalid configuration")
});

/// Nested keys use a double underscore, e.g. `VENDOR__BASE_URL`.
pub fn load() -> Result<AppConfig, ConfigError> {
    Config::builder()
        .add_source(Environment::default().separator("__").try_parsing(true))
        .build()?
        .try_deserialize()
}
