//! Server configuration

use std::net::SocketAddr;

use accesslog::{DEFAULT_BODY_SIZE_LIMIT, LoggerConfig, skip_paths};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid bind address {0:?}")]
    BindAddress(String),

    #[error("Invalid value {value:?} for {name}")]
    InvalidValue { name: &'static str, value: String },
}

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub print_body: bool,
    pub body_size_limit: u64,
    pub context_keys: Vec<String>,
    pub skip_paths: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".into(),
            print_body: true,
            body_size_limit: DEFAULT_BODY_SIZE_LIMIT,
            context_keys: Vec::new(),
            skip_paths: vec!["/health".into()],
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            bind_address: std::env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            print_body: parse_var("ACCESS_LOG_PRINT_BODY")?.unwrap_or(defaults.print_body),
            body_size_limit: parse_var("ACCESS_LOG_BODY_LIMIT")?
                .unwrap_or(defaults.body_size_limit),
            context_keys: std::env::var("ACCESS_LOG_CONTEXT_KEYS")
                .map(|v| parse_list(&v))
                .unwrap_or(defaults.context_keys),
            skip_paths: std::env::var("ACCESS_LOG_SKIP_PATHS")
                .map(|v| parse_list(&v))
                .unwrap_or(defaults.skip_paths),
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_address
            .parse()
            .map_err(|_| ConfigError::BindAddress(self.bind_address.clone()))
    }

    /// Access log middleware configuration for this server
    pub fn logger_config(&self) -> LoggerConfig {
        let mut config = LoggerConfig::default()
            .print_body(self.print_body)
            .body_size_limit(self.body_size_limit)
            .context_keys(self.context_keys.iter().cloned());
        if !self.skip_paths.is_empty() {
            config.skipper = skip_paths(self.skip_paths.iter().cloned());
        }
        config
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(None),
    }
}

/// Split a comma separated list, dropping blank entries
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
