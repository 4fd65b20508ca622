//! The [`Transport`] port and the values it exchanges.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use protocol::{PendingRequest, RawResponse, TransportFailure};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session_id";

/// Username and password for HTTP Basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The authentication attached to a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    None,
    Basic(Credentials),
    /// Session token sent as the [`SESSION_COOKIE`] cookie.
    Session(String),
}

/// A response body delivered chunk by chunk.
pub type ResponseBody = BoxStream<'static, Result<Bytes, TransportFailure>>;

/// A response whose status and headers have arrived; the body may not have.
pub struct HttpResponse {
    pub status: u16,
    /// Header names are lower-case.
    pub headers: BTreeMap<String, String>,
    /// The session token if the response set the [`SESSION_COOKIE`] cookie.
    pub session_id: Option<String>,
    pub body: ResponseBody,
}

impl HttpResponse {
    /// Any 2xx status. Every other status is a failure, whatever the body.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Reads the remaining body into memory.
    pub async fn into_raw(self) -> Result<RawResponse, TransportFailure> {
        self.into_raw_within(None).await
    }

    /// Reads the remaining body into memory, failing with
    /// [`TransportFailure::Silent`] if any chunk takes longer than
    /// `idle_timeout` to arrive.
    pub async fn into_raw_within(mut self, idle_timeout: Option<Duration>) -> Result<RawResponse, TransportFailure> {
        let mut body = Vec::new();
        loop {
            let next = match idle_timeout {
                Some(limit) => tokio::time::timeout(limit, self.body.next())
                    .await
                    .map_err(|_| TransportFailure::Silent(limit))?,
                None => self.body.next().await,
            };
            match next {
                Some(chunk) => body.extend_from_slice(&chunk?),
                None => break,
            }
        }
        Ok(RawResponse {
            status: self.status,
            headers: self.headers,
            body,
        })
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("session_id", &self.session_id.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

/// Sends one request and returns the response head with a streaming body.
///
/// Implementations perform exactly one round trip per call, never retry, and
/// do not interpret status codes. They know nothing about sessions beyond
/// attaching the [`Authorization`] they are handed and reporting the
/// [`SESSION_COOKIE`] they receive.
///
/// For [`protocol::ReadMode::Buffered`] requests the request timeout bounds
/// the whole exchange. For [`protocol::ReadMode::Streamed`] requests it bounds
/// only receiving the response head; the caller enforces the gap between
/// chunks, for an error body as much as for a feed.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        request: &PendingRequest,
        authorization: &Authorization,
    ) -> Result<HttpResponse, TransportFailure>;
}

/// Extracts the value of `name` from `Set-Cookie` header values.
pub(crate) fn cookie_value<'a>(set_cookies: impl IntoIterator<Item = &'a str>, name: &str) -> Option<String> {
    set_cookies.into_iter().find_map(|header| {
        let pair = header.split(';').next()?.trim();
        let (key, value) = pair.split_once('=')?;
        (key.trim() == name).then(|| value.trim().trim_matches('"').to_string())
    })
}

#[cfg(test)]
mod tests {
    use futures::stream;

    use super::*;

    #[test]
    fn test_cookie_value_finds_session_among_others() {
        let headers = ["theme=dark; Path=/", "session_id=abc123; HttpOnly; Path=/"];
        assert_eq!(cookie_value(headers, SESSION_COOKIE).as_deref(), Some("abc123"));
        assert_eq!(cookie_value(["theme=dark"], SESSION_COOKIE), None);
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let rendered = format!("{:?}", Credentials::new("admin", "hunter2"));
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_into_raw_concatenates_chunks() {
        let response = HttpResponse {
            status: 200,
            headers: BTreeMap::new(),
            session_id: None,
            body: stream::iter(vec![Ok(Bytes::from_static(b"ab")), Ok(Bytes::from_static(b"cd"))]).boxed(),
        };
        assert!(response.is_success());
        assert_eq!(response.into_raw().await.unwrap().body, b"abcd");
    }

    #[tokio::test]
    async fn test_into_raw_within_fails_on_stalled_body() {
        let response = HttpResponse {
            status: 500,
            headers: BTreeMap::new(),
            session_id: None,
            body: stream::iter(vec![Ok(Bytes::from_static(b"{\"ti"))])
                .chain(stream::pending())
                .boxed(),
        };
        let limit = Duration::from_millis(20);
        assert_eq!(
            response.into_raw_within(Some(limit)).await.unwrap_err(),
            TransportFailure::Silent(limit)
        );
    }

    #[tokio::test]
    async fn test_into_raw_surfaces_body_failure() {
        let response = HttpResponse {
            status: 200,
            headers: BTreeMap::new(),
            session_id: None,
            body: stream::iter(vec![
                Ok(Bytes::from_static(b"ab")),
                Err(TransportFailure::Interrupted("reset".into())),
            ])
            .boxed(),
        };
        assert_eq!(
            response.into_raw().await.unwrap_err(),
            TransportFailure::Interrupted("reset".into())
        );
    }
}
