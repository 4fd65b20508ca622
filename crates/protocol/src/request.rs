//! Request and response values moved by the transport.
//!
//! A [`PendingRequest`] is built once by a stub and borrowed by every send
//! attempt, so a session retry re-sends exactly the same request.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Timeout applied to ordinary requests unless a stub overrides it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP methods used by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    /// Pre-encoded bytes sent with an explicit content type.
    Raw { bytes: Vec<u8>, content_type: String },
    /// A structured payload encoded as `application/json` by the transport.
    Json(serde_json::Value),
}

/// How the transport hands the response body back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// The whole exchange, body included, must finish within the timeout.
    Buffered,
    /// The body is consumed incrementally; the timeout bounds connecting and
    /// each gap between received chunks.
    Streamed,
}

/// An immutable description of one API request.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Body,
    timeout: Option<Duration>,
    read_mode: ReadMode,
}

impl PendingRequest {
    /// Creates a buffered request with [`DEFAULT_TIMEOUT`] and no body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: Body::Empty,
            timeout: Some(DEFAULT_TIMEOUT),
            read_mode: ReadMode::Buffered,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Creates a streamed GET whose frames may be at most `inter_frame_timeout`
    /// apart. `None` waits forever.
    pub fn streaming(path: impl Into<String>, inter_frame_timeout: Option<Duration>) -> Self {
        Self {
            timeout: inter_frame_timeout,
            read_mode: ReadMode::Streamed,
            ..Self::get(path)
        }
    }

    /// Appends a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Sets pre-encoded bytes as the body.
    pub fn bytes(mut self, bytes: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        self.body = Body::Raw {
            bytes: bytes.into(),
            content_type: content_type.into(),
        };
        self
    }

    /// Sets a JSON body.
    pub fn json<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.body = Body::Json(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Overrides the timeout. `None` disables it.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_params(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn read_mode(&self) -> ReadMode {
        self.read_mode
    }
}

/// A fully-read successful response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawResponse {
    pub status: u16,
    /// Header names are lower-case. Repeated headers keep the last value.
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Returns the header value for a lower-case `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Decodes the body as JSON, or returns `None` if the body is empty.
    pub fn json<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        if self.body.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice(&self.body).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_request_uses_default_timeout() {
        let request = PendingRequest::get("/api/version");
        assert_eq!(request.method(), Method::Get);
        assert_eq!(request.timeout_duration(), Some(DEFAULT_TIMEOUT));
        assert_eq!(request.read_mode(), ReadMode::Buffered);
        assert_eq!(request.body(), &Body::Empty);
    }

    #[test]
    fn test_streaming_request_keeps_inter_frame_timeout() {
        let request = PendingRequest::streaming("/api/streams/statuses", Some(Duration::from_secs(10)));
        assert_eq!(request.method(), Method::Get);
        assert_eq!(request.read_mode(), ReadMode::Streamed);
        assert_eq!(request.timeout_duration(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_query_parameters_keep_order() {
        let request = PendingRequest::get("/api/alerts")
            .query("stream_id", 4)
            .query("limit", 10);
        assert_eq!(
            request.query_params(),
            &[
                ("stream_id".to_string(), "4".to_string()),
                ("limit".to_string(), "10".to_string())
            ]
        );
    }

    #[test]
    fn test_empty_body_decodes_to_none() {
        let response = RawResponse {
            status: 204,
            ..Default::default()
        };
        assert_eq!(response.json::<serde_json::Value>().unwrap(), None);
    }

    #[test]
    fn test_json_body_decodes() {
        let response = RawResponse {
            status: 200,
            body: br#""0.29.1""#.to_vec(),
            ..Default::default()
        };
        assert_eq!(response.json::<String>().unwrap().as_deref(), Some("0.29.1"));
    }
}
