//! # HTTP Client Factory
//!
//! Centralized reqwest client creation so the upstream call and the server
//! share one connection pool with consistent settings.
//!
//! Relayed responses are long-lived streams, so clients are built with a
//! read timeout (idle time between chunks) instead of a total request
//! timeout that would cut off a healthy but slow generation.

use crate::config::Config;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// HTTP client configuration errors
#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("Failed to build HTTP client: {0}")]
    BuildError(#[from] reqwest::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Idle connections kept per upstream host
const POOL_MAX_IDLE_PER_HOST: usize = 10;
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const TCP_KEEPALIVE: Duration = Duration::from_secs(60);

/// Timeouts applied to every upstream request
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub connect_timeout: Duration,
    /// Maximum idle time between body chunks
    pub read_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(120),
        }
    }
}

impl From<&Config> for HttpClientConfig {
    fn from(config: &Config) -> Self {
        Self {
            connect_timeout: Duration::from_secs(config.connect_timeout),
            read_timeout: Duration::from_secs(config.read_timeout),
        }
    }
}

/// HTTP client builder with configurable options
pub struct HttpClientBuilder {
    config: HttpClientConfig,
}

impl HttpClientBuilder {
    /// Create a new HTTP client builder with default configuration
    pub fn new() -> Self {
        Self {
            config: HttpClientConfig::default(),
        }
    }

    /// Create HTTP client builder from application configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            config: HttpClientConfig::from(config),
        }
    }

    /// Set the maximum idle time between body chunks
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Build the HTTP client
    pub fn build(self) -> Result<Client, HttpClientError> {
        if self.config.read_timeout.is_zero() {
            return Err(HttpClientError::InvalidConfig(
                "read timeout must be greater than zero".to_string(),
            ));
        }

        Client::builder()
            .connect_timeout(self.config.connect_timeout)
            .read_timeout(self.config.read_timeout)
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .tcp_keepalive(TCP_KEEPALIVE)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(HttpClientError::from)
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
