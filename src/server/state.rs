//! # Application State
//!
//! Shared state handed to every HTTP handler.

use crate::{
    config::Config,
    core::http_client::HttpClientBuilder,
    upstream::{OpenAIUpstream, UpstreamCall},
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Upstream every relay is opened against
    pub upstream: Arc<dyn UpstreamCall>,
}

impl AppState {
    /// Build state with an [`OpenAIUpstream`] configured from `config`.
    pub fn new(config: Config) -> Result<Self, crate::error::RelayError> {
        let client = HttpClientBuilder::from_config(&config)
            .build()
            .map_err(|e| crate::error::RelayError::Internal(e.to_string()))?;
        let upstream = OpenAIUpstream::from_config(&config, client);

        Ok(Self::with_upstream(config, Arc::new(upstream)))
    }

    /// Build state around any upstream implementation.
    pub fn with_upstream(config: Config, upstream: Arc<dyn UpstreamCall>) -> Self {
        Self { config, upstream }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn upstream(&self) -> &dyn UpstreamCall {
        self.upstream.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_creation() {
        let state = AppState::new(Config::for_test()).unwrap();
        assert_eq!(state.upstream().name(), "openai");
        assert_eq!(state.config().relay_buffer, 16);
    }
}
