//! [`Transport`] over `reqwest`.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use futures::StreamExt;
use protocol::{Body, Method, PendingRequest, ReadMode, TransportFailure};
use reqwest::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use tracing::trace;
use url::Url;

use crate::transport::{cookie_value, Authorization, HttpResponse, Transport, SESSION_COOKIE};

/// Sends requests to one BrainFrame server with a shared connection pool.
///
/// The base URL may be replaced at any time; requests already in flight keep
/// the URL they were built with.
pub struct HttpTransport {
    base_url: RwLock<Option<Url>>,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport. Requests fail with
    /// [`TransportFailure::InvalidRequest`] until a base URL is set.
    pub fn new(base_url: Option<Url>) -> Result<Self, TransportFailure> {
        let client = reqwest::Client::builder().build().map_err(classify)?;
        Ok(Self::with_client(client, base_url))
    }

    /// Creates a transport around an already configured client.
    pub fn with_client(client: reqwest::Client, base_url: Option<Url>) -> Self {
        Self {
            base_url: RwLock::new(base_url),
            client,
        }
    }

    pub fn set_base_url(&self, url: Url) {
        *self.base_url.write().unwrap_or_else(|e| e.into_inner()) = Some(url);
    }

    pub fn base_url(&self) -> Option<Url> {
        self.base_url.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Appends `path` to the base URL verbatim, so a base URL with a path
    /// prefix (e.g. behind a reverse proxy) keeps it.
    fn endpoint(&self, path: &str) -> Result<Url, TransportFailure> {
        let base = self
            .base_url()
            .ok_or_else(|| TransportFailure::InvalidRequest("no server URL has been set".into()))?;
        let joined = format!("{}{}", base.as_str().trim_end_matches('/'), path);
        Url::parse(&joined).map_err(|e| TransportFailure::InvalidRequest(format!("{joined}: {e}")))
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        request: &PendingRequest,
        authorization: &Authorization,
    ) -> Result<HttpResponse, TransportFailure> {
        let url = self.endpoint(request.path())?;
        trace!(%url, method = %request.method(), "sending request");

        let mut builder = self.client.request(reqwest_method(request.method()), url);

        if !request.query_params().is_empty() {
            builder = builder.query(request.query_params());
        }

        builder = match request.body() {
            Body::Empty => builder,
            Body::Raw {
                bytes,
                content_type,
            } => builder
                .header(CONTENT_TYPE, content_type.as_str())
                .body(bytes.clone()),
            Body::Json(value) => builder.json(value),
        };

        builder = match authorization {
            Authorization::None => builder,
            Authorization::Basic(credentials) => {
                builder.basic_auth(&credentials.username, Some(&credentials.password))
            }
            Authorization::Session(token) => builder.header(COOKIE, format!("{SESSION_COOKIE}={token}")),
        };

        let pending = match (request.read_mode(), request.timeout_duration()) {
            (ReadMode::Buffered, Some(limit)) => builder.timeout(limit).send(),
            _ => builder.send(),
        };

        let response = match (request.read_mode(), request.timeout_duration()) {
            (ReadMode::Streamed, Some(limit)) => tokio::time::timeout(limit, pending)
                .await
                .map_err(|_| TransportFailure::TimedOut(format!("no response within {limit:?}")))?,
            _ => pending.await,
        }
        .map_err(classify)?;

        let status = response.status().as_u16();
        let session_id = cookie_value(
            response
                .headers()
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok()),
            SESSION_COOKIE,
        );
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
            .collect();

        trace!(status, "received response head");

        Ok(HttpResponse {
            status,
            headers,
            session_id,
            body: response.bytes_stream().map(|chunk| chunk.map_err(classify)).boxed(),
        })
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Put => reqwest::Method::PUT,
        Method::Post => reqwest::Method::POST,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

/// Maps a reqwest error onto the transport failure taxonomy, keeping the
/// whole source chain in the message.
fn classify(err: reqwest::Error) -> TransportFailure {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    if err.is_timeout() {
        TransportFailure::TimedOut(message)
    } else if err.is_connect() {
        TransportFailure::Connect(message)
    } else if err.is_builder() {
        TransportFailure::InvalidRequest(message)
    } else {
        TransportFailure::Interrupted(message)
    }
}
