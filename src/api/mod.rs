//! Hosted inference API: request building, submission and token streaming

mod client;
mod request;
mod response;
mod sse;
mod streaming;
mod transport;

pub use client::{Connector, DEFAULT_CHANNEL_CAPACITY};
pub use request::{
    GenerationInput, GenerationOverrides, GenerationRequest, DEFAULT_LENGTH_PENALTY,
    DEFAULT_MAX_NEW_TOKENS, DEFAULT_PRESENCE_PENALTY, DEFAULT_PROMPT_TEMPLATE,
    DEFAULT_TEMPERATURE, DEFAULT_TOP_K, DEFAULT_TOP_P,
};
pub use response::{StreamEndpointResponse, StreamUrls};
pub use sse::{classify_line, StreamLine, DATA_MARKER, DATA_PREFIX, DATA_PREFIX_LEN, END_OF_OUTPUT};
pub use streaming::{drive_stream, run_reader, GenerationStream, ReaderOutcome, StreamChunk};
pub use transport::{HttpLineSource, HttpStreamTransport, LineBuffer, LineSource, StreamTransport};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to decode submission response: {0}")]
    ResponseDecode(#[source] serde_json::Error),

    #[error("Malformed stream line, data marker not at offset 0: {line:?}")]
    Framing { line: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

impl ApiError {
    /// Whether the error happened below the protocol layer (network, status)
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ApiError::Http(_) | ApiError::Status { .. } | ApiError::Transport(_)
        )
    }
}
