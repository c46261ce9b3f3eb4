//! Streaming prediction output to a consumer
//!
//! The reader runs as its own task and publishes [`StreamChunk`]s into a
//! bounded channel. Every exit path releases the connection once, publishes
//! at most one `Done` or `Error`, and then closes the channel.

use super::sse::{classify_line, StreamLine};
use super::transport::{LineSource, StreamTransport};
use super::ApiError;
use futures_util::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// A chunk of a streaming generation
#[derive(Debug)]
pub enum StreamChunk {
    /// Raw text of one stream line
    TextDelta(String),
    /// No more tokens: either the end-of-output sentinel or the end of the
    /// connection body
    Done,
    /// The stream failed; nothing follows
    Error(ApiError),
}

impl StreamChunk {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamChunk::Done | StreamChunk::Error(_))
    }
}

/// How a reader task finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderOutcome {
    /// The end-of-output sentinel was read
    Terminal,
    /// The source ran dry before the sentinel
    EndOfSource,
    /// A read or framing error was published
    Failed,
    /// The stream could not be opened
    OpenFailed,
    /// The consumer cancelled or went away
    Cancelled,
}

/// Consumer handle for a running generation.
///
/// Yields chunks in source order and ends after `Done` or `Error`. Dropping
/// the handle cancels the reader task.
pub struct GenerationStream {
    inner: ReceiverStream<StreamChunk>,
    cancel: CancellationToken,
}

impl GenerationStream {
    pub(crate) fn new(rx: mpsc::Receiver<StreamChunk>, cancel: CancellationToken) -> Self {
        Self {
            inner: ReceiverStream::new(rx),
            cancel,
        }
    }

    /// Spawn a reader for `url` on the current tokio runtime
    pub(crate) fn spawn(
        transport: Arc<dyn StreamTransport>,
        url: String,
        api_key: String,
        capacity: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        tokio::spawn(async move {
            let outcome = drive_stream(transport.as_ref(), &url, &api_key, tx, task_cancel).await;
            debug!(?outcome, "Stream reader finished");
        });

        Self::new(rx, cancel)
    }

    /// Next chunk, or `None` once the stream has completed
    pub async fn recv(&mut self) -> Option<StreamChunk> {
        self.inner.next().await
    }

    /// Stop the reader task and release its connection
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Concatenate every fragment until the stream completes
    pub async fn collect_text(mut self) -> Result<String, ApiError> {
        let mut text = String::new();
        while let Some(chunk) = self.recv().await {
            match chunk {
                StreamChunk::TextDelta(delta) => text.push_str(&delta),
                StreamChunk::Done => break,
                StreamChunk::Error(e) => return Err(e),
            }
        }
        Ok(text)
    }
}

impl Stream for GenerationStream {
    type Item = StreamChunk;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}

impl Drop for GenerationStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Open `url` and run the read loop, publishing into `tx`.
///
/// An open failure is published once as `StreamChunk::Error`; no connection
/// exists on that path, so nothing is released.
pub async fn drive_stream(
    transport: &dyn StreamTransport,
    url: &str,
    api_key: &str,
    tx: mpsc::Sender<StreamChunk>,
    cancel: CancellationToken,
) -> ReaderOutcome {
    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => return ReaderOutcome::Cancelled,
        opened = transport.open(url, api_key) => opened,
    };

    match opened {
        Ok(source) => run_reader(source, tx, cancel).await,
        Err(e) => {
            warn!(error = %e, "Failed to open prediction stream");
            publish(&tx, &cancel, StreamChunk::Error(e)).await;
            ReaderOutcome::OpenFailed
        }
    }
}

/// Read lines from `source` until the sentinel, the end of the source, an
/// error, or cancellation.
///
/// Consumes the source: it is dropped, releasing the connection, before the
/// channel is closed.
pub async fn run_reader(
    mut source: Box<dyn LineSource>,
    tx: mpsc::Sender<StreamChunk>,
    cancel: CancellationToken,
) -> ReaderOutcome {
    let outcome = read_lines(source.as_mut(), &tx, &cancel).await;
    drop(source);
    drop(tx);
    outcome
}

async fn read_lines(
    source: &mut dyn LineSource,
    tx: &mpsc::Sender<StreamChunk>,
    cancel: &CancellationToken,
) -> ReaderOutcome {
    let mut fragments = 0usize;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ReaderOutcome::Cancelled,
            next = source.next_line() => next,
        };

        let line = match next {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!(fragments, "Stream ended without end-of-output marker");
                return finish(tx, cancel, StreamChunk::Done, ReaderOutcome::EndOfSource).await;
            }
            Err(e) => {
                warn!(error = %e, "Prediction stream read failed");
                return finish(tx, cancel, StreamChunk::Error(e), ReaderOutcome::Failed).await;
            }
        };

        match classify_line(&line) {
            Ok(StreamLine::Fragment(text)) => {
                fragments += 1;
                if !publish(tx, cancel, StreamChunk::TextDelta(text)).await {
                    return ReaderOutcome::Cancelled;
                }
            }
            Ok(StreamLine::Terminal) => {
                debug!(fragments, "End of output");
                return finish(tx, cancel, StreamChunk::Done, ReaderOutcome::Terminal).await;
            }
            Ok(StreamLine::Ignorable) => trace!(%line, "Skipping non-data line"),
            Err(e) => {
                warn!(error = %e, "Malformed prediction stream");
                return finish(tx, cancel, StreamChunk::Error(e), ReaderOutcome::Failed).await;
            }
        }
    }
}

async fn finish(
    tx: &mpsc::Sender<StreamChunk>,
    cancel: &CancellationToken,
    chunk: StreamChunk,
    outcome: ReaderOutcome,
) -> ReaderOutcome {
    if publish(tx, cancel, chunk).await {
        outcome
    } else {
        ReaderOutcome::Cancelled
    }
}

/// Send one chunk; false if the consumer cancelled or dropped the receiver
async fn publish(
    tx: &mpsc::Sender<StreamChunk>,
    cancel: &CancellationToken,
    chunk: StreamChunk,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(chunk) => sent.is_ok(),
    }
}
