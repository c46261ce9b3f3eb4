//! Terminal output for streamed generations

pub mod spinner;

pub use spinner::ThinkingSpinner;

use crate::api::{ApiError, GenerationStream, StreamChunk};
use std::io::Write;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stream error: {0}")]
    Stream(#[from] ApiError),
}

/// What a rendered stream produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub fragments: usize,
    pub bytes: usize,
    /// Time from the spinner starting to the first fragment; `None` if the
    /// stream produced no fragments
    pub first_fragment_after: Option<Duration>,
}

/// Write every fragment of `stream` to `out` as it arrives.
///
/// The spinner runs until the first fragment (or the end of the stream).
/// Fragments are written verbatim, flushed one at a time.
pub async fn render_stream<W: Write>(
    mut stream: GenerationStream,
    out: &mut W,
    mut spinner: ThinkingSpinner,
) -> Result<StreamSummary, RenderError> {
    let mut summary = StreamSummary::default();
    spinner.start("Thinking...");

    while let Some(chunk) = stream.recv().await {
        match chunk {
            StreamChunk::TextDelta(text) => {
                if let Some(waited) = spinner.stop() {
                    summary.first_fragment_after = Some(waited);
                }
                out.write_all(text.as_bytes())?;
                out.flush()?;
                summary.fragments += 1;
                summary.bytes += text.len();
            }
            StreamChunk::Done => break,
            StreamChunk::Error(e) => {
                spinner.stop();
                return Err(RenderError::Stream(e));
            }
        }
    }

    spinner.stop();
    Ok(summary)
}
