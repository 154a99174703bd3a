#[cfg(feature = "cli")]
use clap::Parser;
use url::Url;

/// # Relay Configuration
///
/// Command-line arguments and environment variables (optionally loaded from
/// a `.env` file) controlling where the relay sends requests and how it
/// streams the results back.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "cli", derive(Parser))]
#[cfg_attr(feature = "cli", command(name = "chat-relay"))]
#[cfg_attr(feature = "cli", command(about = "Relays streamed chat completions from an OpenAI-compatible endpoint as plain text"))]
#[cfg_attr(feature = "cli", command(version))]
pub struct Config {
    // =============================================================================
    // SERVER
    // =============================================================================

    /// Server port to listen on
    #[cfg_attr(feature = "cli", arg(short, long, env = "PORT", default_value = "3000"))]
    pub port: u16,

    /// Server host to bind to
    #[cfg_attr(feature = "cli", arg(long, env = "HOST", default_value = "0.0.0.0"))]
    pub host: String,

    // =============================================================================
    // UPSTREAM
    // =============================================================================

    /// Base URL of the OpenAI-compatible upstream
    #[cfg_attr(feature = "cli", arg(long, env = "OPENAI_API_HOST", default_value = "http://127.0.0.1:8000"))]
    pub upstream_url: String,

    /// Default credential, used when a request carries no key
    #[cfg_attr(feature = "cli", arg(long, env = "OPENAI_API_KEY", hide_env_values = true))]
    pub api_key: Option<String>,

    /// Organization sent as `OpenAI-Organization`
    #[cfg_attr(feature = "cli", arg(long, env = "OPENAI_ORGANIZATION"))]
    pub organization: Option<String>,

    /// `max_tokens` sent with every completion request
    #[cfg_attr(feature = "cli", arg(long, env = "MAX_TOKENS", default_value = "1000"))]
    pub max_tokens: u32,

    /// `temperature` sent with every completion request
    #[cfg_attr(feature = "cli", arg(long, env = "TEMPERATURE", default_value = "1"))]
    pub temperature: f32,

    // =============================================================================
    // HTTP CLIENT AND STREAMING
    // =============================================================================

    /// Connection timeout in seconds
    #[cfg_attr(feature = "cli", arg(long, env = "HTTP_CONNECT_TIMEOUT", default_value = "10"))]
    pub connect_timeout: u64,

    /// Maximum idle time between upstream chunks in seconds
    #[cfg_attr(feature = "cli", arg(long, env = "HTTP_READ_TIMEOUT", default_value = "120"))]
    pub read_timeout: u64,

    /// Capacity of the bounded queue between the relay driver and its consumer
    #[cfg_attr(feature = "cli", arg(long, env = "RELAY_BUFFER", default_value = "16"))]
    pub relay_buffer: usize,

    // =============================================================================
    // LOGGING
    // =============================================================================

    /// Log level (error, warn, info, debug, trace)
    #[cfg_attr(feature = "cli", arg(long, env = "RUST_LOG", default_value = "info"))]
    pub log_level: String,
}

impl Config {
    /// Parse configuration from command line arguments and environment variables.
    ///
    /// Loads `.env` if present, parses arguments, sets up logging and exits
    /// the process with a message when validation fails.
    #[cfg(feature = "cli")]
    pub fn parse_args() -> Self {
        // Missing .env is fine
        let _ = dotenv::dotenv();

        let config = Self::parse();
        config.setup_logging();

        if let Err(err) = config.validate() {
            eprintln!("Configuration validation failed: {}", err);
            std::process::exit(1);
        }

        config
    }

    /// Create a test configuration with every field set.
    pub fn for_test() -> Self {
        Self {
            port: 3000,
            host: "127.0.0.1".to_string(),
            upstream_url: "http://127.0.0.1:8000".to_string(),
            api_key: None,
            organization: None,
            max_tokens: 1000,
            temperature: 1.0,
            connect_timeout: 10,
            read_timeout: 120,
            relay_buffer: 16,
            log_level: "info".to_string(),
        }
    }

    /// Full URL of the upstream chat completions endpoint.
    pub fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.upstream_url.trim_end_matches('/'))
    }

    #[cfg(feature = "cli")]
    fn setup_logging(&self) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new(&self.log_level))
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .try_init();
    }

    /// Validate configuration values and return a helpful message for the
    /// first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("Port cannot be 0. Please specify a valid port number (1-65535).".to_string());
        }

        if self.host.is_empty() {
            return Err("Host cannot be empty. Please specify a valid host (e.g., '0.0.0.0', 'localhost', or an IP address).".to_string());
        }

        if self.upstream_url.is_empty() {
            return Err("Upstream URL cannot be empty. Please specify the OpenAI-compatible endpoint.".to_string());
        }

        match Url::parse(&self.upstream_url) {
            Ok(url) => {
                if !["http", "https"].contains(&url.scheme()) {
                    return Err(format!(
                        "Invalid URL scheme '{}'. Only 'http' and 'https' are supported.",
                        url.scheme()
                    ));
                }
                if url.host().is_none() {
                    return Err("Upstream URL must include a host (e.g., 'http://127.0.0.1:8000').".to_string());
                }
            }
            Err(err) => {
                return Err(format!(
                    "Invalid upstream URL format '{}': {}. \
                    Please provide a valid URL (e.g., 'http://127.0.0.1:8000').",
                    self.upstream_url, err
                ));
            }
        }

        if self.max_tokens == 0 {
            return Err("max_tokens must be greater than 0.".to_string());
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "Temperature {} is out of range. Valid values are between 0 and 2.",
                self.temperature
            ));
        }

        if self.connect_timeout == 0 {
            return Err("HTTP connect timeout must be greater than 0 seconds.".to_string());
        }
        if self.read_timeout == 0 {
            return Err("HTTP read timeout must be greater than 0 seconds.".to_string());
        }

        if self.relay_buffer == 0 {
            return Err("Relay buffer must hold at least one fragment.".to_string());
        }

        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log level '{}'. Valid options are: {}",
                self.log_level,
                valid_log_levels.join(", ")
            ));
        }

        if self.api_key.as_deref().map_or(true, str::is_empty) {
            tracing::warn!("No OPENAI_API_KEY configured; every request must carry its own key");
        }

        Ok(())
    }
}
