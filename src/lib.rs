//! # chat_relay - Streamed Chat Completion Relay
//!
//! Relays a streamed chat completion from an OpenAI-compatible upstream to a
//! downstream consumer as a plain byte stream of generated text. The
//! upstream's server-sent events are framed, interpreted and re-emitted as
//! UTF-8 text fragments, in arrival order, with the relay closing once all
//! upstream data has been drained.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chat_relay::{relay_chat, Config, HttpClientBuilder, OpenAIUpstream, RelayRequest};
//! use chat_relay::schemas::{Message, OpenAIModel};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::for_test();
//!     let client = HttpClientBuilder::from_config(&config).build()?;
//!     let upstream = OpenAIUpstream::from_config(&config, client);
//!
//!     let request = RelayRequest {
//!         model: OpenAIModel::new("gpt-3.5-turbo"),
//!         system_prompt: "You are a helpful assistant.".to_string(),
//!         key: "sk-...".to_string(),
//!         messages: vec![Message::new("user", "Hello!")],
//!     };
//!
//!     let relay = relay_chat(&upstream, &request, config.relay_buffer).await?;
//!     println!("{}", relay.read_to_string().await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`config`] - Configuration from CLI arguments and environment
//! - [`upstream`] - The outbound chat completion call
//! - [`streaming`] - Event parsing, interpretation and the relay stream
//! - [`schemas`] - Request and stream chunk data structures
//! - [`error`] - Error types and HTTP mapping
//! - [`server`] - HTTP surface (feature `server`)

pub mod config;
pub mod core;
pub mod error;
pub mod schemas;
pub mod streaming;
pub mod upstream;

#[cfg(feature = "server")]
pub mod server;

pub use config::Config;
pub use crate::core::http_client::{HttpClientBuilder, HttpClientConfig};
pub use error::{ApiError, RelayError};
pub use schemas::{Message, RelayRequest};
pub use streaming::{relay_chat, RelayStream};
pub use upstream::{ByteStream, OpenAIUpstream, UpstreamCall};

#[cfg(feature = "server")]
pub use server::{create_router, AppState};
