use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use dotenv::dotenv;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} env variable must be set")]
    Missing(&'static str),
    #[error("{name} env variable is invalid: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
    pub busy_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub app_url: SocketAddr,
    pub database: DatabaseConfig,
}

impl Config {
    /// Reads the configuration from the environment, after loading `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::Missing(name));
        let parsed = |name: &'static str, default: u64| -> Result<u64, ConfigError> {
            match lookup(name) {
                Some(value) => value
                    .parse::<u64>()
                    .map_err(|_| ConfigError::Invalid { name, value }),
                None => Ok(default),
            }
        };

        let app_url = required("APP_URL")?;
        let app_url = app_url.parse().map_err(|_| ConfigError::Invalid {
            name: "APP_URL",
            value: app_url,
        })?;

        let pool_size = parsed("DATABASE_POOL_SIZE", 10)?;
        if pool_size == 0 || pool_size > u32::MAX as u64 {
            return Err(ConfigError::Invalid {
                name: "DATABASE_POOL_SIZE",
                value: pool_size.to_string(),
            });
        }

        Ok(Config {
            app_url,
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                pool_size: pool_size as u32,
                busy_timeout: Duration::from_millis(parsed("DATABASE_BUSY_TIMEOUT_MS", 5_000)?),
            },
        })
    }
}
