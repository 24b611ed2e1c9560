use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::pix::Merchant;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value: {value}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub port: u16,
    pub user_store_path: Option<String>,
    pub pix: PixConfig,
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixConfig {
    pub key: String,
    pub merchant_name: String,
    pub merchant_city: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub payment_delay_ms: u64,
    pub payment_timeout_ms: u64,
    pub expiry_sweep_interval_secs: u64,
    pub checkout_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = AppConfig::default();
        let pix = PixConfig::default();

        Ok(Config {
            port: parse_var("PORT", 8080)?,
            user_store_path: env::var("USER_STORE_PATH").ok().filter(|p| !p.trim().is_empty()),

            pix: PixConfig {
                key: env::var("PIX_KEY").unwrap_or(pix.key),
                merchant_name: env::var("PIX_MERCHANT_NAME").unwrap_or(pix.merchant_name),
                merchant_city: env::var("PIX_MERCHANT_CITY").unwrap_or(pix.merchant_city),
            },

            app: AppConfig {
                payment_delay_ms: parse_var("PAYMENT_DELAY_MS", defaults.payment_delay_ms)?,
                payment_timeout_ms: parse_var("PAYMENT_TIMEOUT_MS", defaults.payment_timeout_ms)?,
                expiry_sweep_interval_secs: parse_nonzero(
                    "EXPIRY_SWEEP_INTERVAL_SECS",
                    defaults.expiry_sweep_interval_secs,
                )?,
                checkout_ttl_secs: parse_var("CHECKOUT_TTL_SECS", defaults.checkout_ttl_secs)?,
            },
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(default),
    }
}

fn parse_nonzero(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match parse_var(name, default)? {
        0 => Err(ConfigError::InvalidValue {
            name,
            value: "0".to_string(),
        }),
        value => Ok(value),
    }
}

impl PixConfig {
    pub fn merchant(&self) -> Merchant {
        Merchant::new(&self.key, &self.merchant_name, &self.merchant_city)
    }
}

impl Default for PixConfig {
    fn default() -> Self {
        let merchant = Merchant::default();
        Self {
            key: merchant.key,
            merchant_name: merchant.name,
            merchant_city: merchant.city,
        }
    }
}

impl AppConfig {
    pub fn payment_delay(&self) -> Duration {
        Duration::from_millis(self.payment_delay_ms)
    }

    pub fn payment_timeout(&self) -> Duration {
        Duration::from_millis(self.payment_timeout_ms)
    }

    pub fn expiry_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_sweep_interval_secs)
    }

    pub fn checkout_ttl(&self) -> Duration {
        Duration::from_secs(self.checkout_ttl_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            payment_delay_ms: 2000,
            payment_timeout_ms: 10_000,
            expiry_sweep_interval_secs: 3600,
            checkout_ttl_secs: 86_400,
        }
    }
}
