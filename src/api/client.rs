//! Connector for a hosted Llama-2 chat prediction endpoint

use super::request::GenerationRequest;
use super::response::StreamEndpointResponse;
use super::streaming::GenerationStream;
use super::transport::{HttpStreamTransport, StreamTransport};
use super::ApiError;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Capacity of the fragment channel between reader task and consumer
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Submits generations and streams their output.
///
/// Holds only read-only configuration; clones share the HTTP connection pool
/// and can be used from many tasks at once. Each stream gets its own
/// connection.
#[derive(Clone)]
pub struct Connector {
    api_url: String,
    api_key: String,
    client: Client,
    transport: Arc<dyn StreamTransport>,
    channel_capacity: usize,
}

impl Connector {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = Client::new();
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            transport: Arc::new(HttpStreamTransport::new(client.clone())),
            client,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Use a preconfigured reqwest client for both calls
    pub fn with_client(mut self, client: Client) -> Self {
        self.transport = Arc::new(HttpStreamTransport::new(client.clone()));
        self.client = client;
        self
    }

    /// Replace the transport used to open prediction streams
    pub fn with_transport(mut self, transport: Arc<dyn StreamTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    /// Post a generation request and return the URL of its output stream.
    ///
    /// The URL is returned as sent by the service, even when empty; opening
    /// a bad URL fails later on the stream.
    #[instrument(skip_all, fields(endpoint = %self.api_url))]
    pub async fn submit(&self, request: &GenerationRequest) -> Result<String, ApiError> {
        let body = serde_json::to_vec(request)?;

        let response = self
            .client
            .post(&self.api_url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let envelope: StreamEndpointResponse =
            serde_json::from_slice(&bytes).map_err(ApiError::ResponseDecode)?;

        let stream_url = envelope.stream_url().to_string();
        info!(%status, %stream_url, "Prediction submitted");
        Ok(stream_url)
    }

    /// Start reading the output stream at `url` in a background task.
    ///
    /// Returns immediately; must be called from within a tokio runtime.
    #[instrument(skip_all)]
    pub fn stream(&self, url: impl Into<String>) -> GenerationStream {
        let url = url.into();
        debug!(%url, capacity = self.channel_capacity, "Spawning stream reader");
        GenerationStream::spawn(
            self.transport.clone(),
            url,
            self.api_key.clone(),
            self.channel_capacity,
        )
    }

    /// Submit `request` and start streaming its output
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationStream, ApiError> {
        let url = self.submit(request).await?;
        Ok(self.stream(url))
    }
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("channel_capacity", &self.channel_capacity)
            .finish_non_exhaustive()
    }
}
