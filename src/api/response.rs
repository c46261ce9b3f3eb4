//! Submission response structures

use serde::{Deserialize, Serialize};

/// Envelope returned by the predictions endpoint.
///
/// Only `urls.stream` is consumed; every other field the service sends is
/// ignored during deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEndpointResponse {
    pub urls: StreamUrls,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamUrls {
    /// Polling URL for the prediction
    #[serde(default)]
    pub get: String,
    /// Server-sent event stream for the prediction output
    #[serde(default)]
    pub stream: String,
}

impl StreamEndpointResponse {
    pub fn stream_url(&self) -> &str {
        &self.urls.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extra_fields_ignored() {
        let body = r#"{
            "id": "abc123",
            "status": "starting",
            "urls": {
                "cancel": "https://api.example.com/v1/predictions/abc123/cancel",
                "get": "https://api.example.com/v1/predictions/abc123",
                "stream": "https://stream.example.com/v1/streams/xyz"
            }
        }"#;

        let parsed: StreamEndpointResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.stream_url(), "https://stream.example.com/v1/streams/xyz");
        assert_eq!(parsed.urls.get, "https://api.example.com/v1/predictions/abc123");
    }

    #[test]
    fn test_missing_stream_url_is_empty() {
        let parsed: StreamEndpointResponse =
            serde_json::from_str(r#"{"urls":{"get":"g"}}"#).unwrap();
        assert_eq!(parsed.stream_url(), "");
    }

    #[test]
    fn test_missing_urls_is_an_error() {
        assert!(serde_json::from_str::<StreamEndpointResponse>(r#"{"id":"x"}"#).is_err());
    }
}
