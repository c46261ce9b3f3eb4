//! llama-stream - Stream Llama-2 chat generations from a hosted inference API
//!
//! Generation happens in two calls: a POST that submits the request and
//! returns a stream URL, and a GET on that URL whose server-sent events carry
//! the generated tokens.
//!
//! ```no_run
//! use llama_stream::{Connector, GenerationRequest, StreamChunk};
//!
//! # async fn run() -> Result<(), llama_stream::ApiError> {
//! let connector = Connector::new(
//!     "https://api.replicate.com/v1/models/meta/llama-2-13b-chat/predictions",
//!     "r8_...",
//! );
//! let request = GenerationRequest::new_default("Why is the sky blue?", "Be concise.");
//! let mut stream = connector.generate(&request).await?;
//!
//! while let Some(chunk) = stream.recv().await {
//!     match chunk {
//!         StreamChunk::TextDelta(text) => print!("{}", text),
//!         StreamChunk::Done => break,
//!         StreamChunk::Error(e) => return Err(e),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod tui;

pub use api::{
    classify_line, ApiError, Connector, GenerationInput, GenerationOverrides, GenerationRequest,
    GenerationStream, LineSource, StreamChunk, StreamEndpointResponse, StreamLine,
    StreamTransport,
};
pub use config::{Config, ConfigBuilder, ConfigError};
