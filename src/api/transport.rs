//! Line sources for the prediction stream
//!
//! The reader only needs "open a URL" and "give me the next line". Both sit
//! behind traits so the read loop can run against reqwest or an in-memory
//! source.

use super::ApiError;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL};
use reqwest::{Client, Response};
use tracing::debug;

/// A line-oriented view over an open stream connection.
///
/// Dropping the source releases the underlying connection.
#[async_trait]
pub trait LineSource: Send {
    /// Next line without its terminator, or `None` once the source is exhausted
    async fn next_line(&mut self) -> Result<Option<String>, ApiError>;
}

/// Opens the stream endpoint returned by a submission
#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn open(&self, url: &str, api_key: &str) -> Result<Box<dyn LineSource>, ApiError>;
}

/// Longest line the splitter will buffer before giving up on the stream
pub const MAX_LINE_BYTES: usize = 1 << 20;

/// Splits a byte stream into `\n`-terminated lines.
///
/// Bytes are buffered until a full line is available so multi-byte characters
/// split across network chunks decode intact. A trailing `\r` is dropped.
#[derive(Debug)]
pub struct LineBuffer {
    buffer: Vec<u8>,
    limit: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::with_limit(MAX_LINE_BYTES)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            buffer: Vec::new(),
            limit,
        }
    }

    /// Append a chunk; fails once a line grows past the limit without a
    /// terminator
    pub fn push(&mut self, chunk: &[u8]) -> Result<(), ApiError> {
        self.buffer.extend_from_slice(chunk);
        let pending = self
            .buffer
            .iter()
            .position(|b| *b == b'\n')
            .unwrap_or(self.buffer.len());
        if pending > self.limit {
            return Err(ApiError::Transport(format!(
                "stream line exceeds {} bytes",
                self.limit
            )));
        }
        Ok(())
    }

    /// Take the next complete line, if one is buffered
    pub fn next_line(&mut self) -> Option<String> {
        let newline_pos = self.buffer.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
        line.pop();
        Some(Self::decode(line))
    }

    /// Take whatever is left once the byte stream has ended
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        Some(Self::decode(line))
    }

    fn decode(mut line: Vec<u8>) -> String {
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        String::from_utf8_lossy(&line).into_owned()
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Line source over a streaming reqwest response body
pub struct HttpLineSource {
    inner: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    buffer: LineBuffer,
    exhausted: bool,
}

impl HttpLineSource {
    pub fn new(response: Response) -> Self {
        let inner = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();
        Self {
            inner,
            buffer: LineBuffer::new(),
            exhausted: false,
        }
    }
}

#[async_trait]
impl LineSource for HttpLineSource {
    async fn next_line(&mut self) -> Result<Option<String>, ApiError> {
        loop {
            if let Some(line) = self.buffer.next_line() {
                return Ok(Some(line));
            }
            if self.exhausted {
                return Ok(self.buffer.finish());
            }
            match self.inner.next().await {
                Some(Ok(chunk)) => self.buffer.push(&chunk)?,
                Some(Err(e)) => return Err(ApiError::Http(e)),
                None => self.exhausted = true,
            }
        }
    }
}

/// Opens prediction streams over HTTP
#[derive(Debug, Clone)]
pub struct HttpStreamTransport {
    client: Client,
}

impl HttpStreamTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StreamTransport for HttpStreamTransport {
    async fn open(&self, url: &str, api_key: &str) -> Result<Box<dyn LineSource>, ApiError> {
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", api_key))
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-store")
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

        debug!(%status, "Prediction stream opened");
        Ok(Box::new(HttpLineSource::new(response)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_lines_across_chunks() {
        let mut buffer = LineBuffer::new();
        buffer.push(b"event: output\nda").unwrap();
        assert_eq!(buffer.next_line().as_deref(), Some("event: output"));
        assert_eq!(buffer.next_line(), None);

        buffer.push(b"ta: Hel").unwrap();
        assert_eq!(buffer.next_line(), None);
        buffer.push(b"lo\n\n").unwrap();
        assert_eq!(buffer.next_line().as_deref(), Some("data: Hello"));
        assert_eq!(buffer.next_line().as_deref(), Some(""));
        assert_eq!(buffer.next_line(), None);
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_crlf_terminators() {
        let mut buffer = LineBuffer::new();
        buffer.push(b"data: a\r\ndata: {}\r\n").unwrap();
        assert_eq!(buffer.next_line().as_deref(), Some("data: a"));
        assert_eq!(buffer.next_line().as_deref(), Some("data: {}"));
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let bytes = "data: café\n".as_bytes();
        let (head, tail) = bytes.split_at(bytes.len() - 2);

        let mut buffer = LineBuffer::new();
        buffer.push(head).unwrap();
        assert_eq!(buffer.next_line(), None);
        buffer.push(tail).unwrap();
        assert_eq!(buffer.next_line().as_deref(), Some("data: café"));
    }

    #[test]
    fn test_unterminated_last_line() {
        let mut buffer = LineBuffer::new();
        buffer.push(b"data: tail").unwrap();
        assert_eq!(buffer.next_line(), None);
        assert_eq!(buffer.finish().as_deref(), Some("data: tail"));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_line_limit_rejects_runaway_line() {
        let mut buffer = LineBuffer::with_limit(8);
        buffer.push(b"data: ok\n").unwrap();
        assert_eq!(buffer.next_line().as_deref(), Some("data: ok"));

        buffer.push(b"data: ").unwrap();
        match buffer.push(b"unterminated") {
            Err(ApiError::Transport(msg)) => assert!(msg.contains("8 bytes")),
            other => panic!("Expected transport error, got {:?}", other),
        }
    }
}
