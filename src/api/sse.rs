//! Server-Sent Events line classifier for the prediction output stream
//!
//! The service frames every token as a single `data: <token>` line, interleaved
//! with `event:`/`id:` lines and blank keep-alives. Generation ends with the
//! payload `{}`:
//!
//! ```text
//! event: output
//! id: 1690212292:0
//! data: Hello
//!
//! event: done
//! data: {}
//! ```

use super::ApiError;

/// Marker identifying a payload line
pub const DATA_MARKER: &str = "data:";
/// Marker plus the single space separating it from the payload
pub const DATA_PREFIX: &str = "data: ";
pub const DATA_PREFIX_LEN: usize = DATA_PREFIX.len();
/// Payload the service sends once no more tokens will be produced
pub const END_OF_OUTPUT: &str = "{}";

/// Outcome of classifying one line of the event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamLine {
    /// Raw payload text, not JSON-decoded
    Fragment(String),
    /// The end-of-output sentinel
    Terminal,
    /// Keep-alives, blank separators and non-data fields
    Ignorable,
}

/// Classify a single stream line (without its line terminator).
///
/// Lines lacking the data marker are ignorable. A data line must start with
/// the 6-byte `data: ` prefix; the payload is everything after it. A marker at
/// any other position is a framing error.
pub fn classify_line(line: &str) -> Result<StreamLine, ApiError> {
    if !line.contains(DATA_MARKER) {
        return Ok(StreamLine::Ignorable);
    }

    // Empty payload with the trailing space trimmed by the server
    if line == DATA_MARKER {
        return Ok(StreamLine::Fragment(String::new()));
    }

    let payload = line
        .strip_prefix(DATA_PREFIX)
        .ok_or_else(|| ApiError::Framing {
            line: line.to_string(),
        })?;

    if payload == END_OF_OUTPUT {
        return Ok(StreamLine::Terminal);
    }

    Ok(StreamLine::Fragment(payload.to_string()))
}
