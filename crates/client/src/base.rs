//! The shared request core every resource stub is built on.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use protocol::{ErrorRegistry, Method, PendingRequest, RawResponse};
use serde::de::DeserializeOwned;
use serde::Serialize;
use transport::{Credentials, HttpTransport, SessionAuthenticator};
use url::Url;

use crate::config::parse_server_url;
use crate::error::ClientError;

/// Lower-case response header names to values.
pub type Headers = BTreeMap<String, String>;

/// Owns the HTTP transport and the session, and offers the JSON helpers the
/// resource stubs are written in.
pub struct ApiCore {
    transport: Arc<HttpTransport>,
    session: Arc<SessionAuthenticator>,
    default_timeout: Duration,
}

impl ApiCore {
    pub fn new(
        server_url: Option<Url>,
        registry: Arc<ErrorRegistry>,
        default_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let transport = Arc::new(HttpTransport::new(server_url)?);
        let session = Arc::new(SessionAuthenticator::new(transport.clone(), registry));
        Ok(Self {
            transport,
            session,
            default_timeout,
        })
    }

    /// Points all future requests at `url`. Only `http` and `https` URLs are
    /// accepted.
    pub fn set_url(&self, url: &str) -> Result<(), ClientError> {
        self.transport.set_base_url(parse_server_url(url)?);
        Ok(())
    }

    pub fn server_url(&self) -> Option<Url> {
        self.transport.base_url()
    }

    /// Authenticates future requests with `credentials`, or stops
    /// authenticating with `None`. Any existing session is dropped.
    pub fn set_credentials(&self, credentials: Option<Credentials>) {
        self.session.set_credentials(credentials);
    }

    pub fn session(&self) -> &Arc<SessionAuthenticator> {
        &self.session
    }

    /// A request on `path` with the default timeout.
    pub fn request(&self, method: Method, path: impl Into<String>) -> PendingRequest {
        PendingRequest::new(method, path).timeout(Some(self.default_timeout))
    }

    pub async fn send(&self, request: &PendingRequest) -> Result<RawResponse, ClientError> {
        Ok(self.session.send(request).await?)
    }

    /// Sends a GET and decodes the body. An empty body gives `None`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        request: PendingRequest,
    ) -> Result<(Option<T>, Headers), ClientError> {
        let raw = self.send(&request).await?;
        let value = raw.json()?;
        Ok((value, raw.headers))
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<Option<T>, ClientError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        self.send_json(Method::Put, path, body).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<Option<T>, ClientError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        self.send_json(Method::Post, path, body).await
    }

    pub async fn patch_json<B, T>(&self, path: &str, body: &B) -> Result<Option<T>, ClientError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        self.send_json(Method::Patch, path, body).await
    }

    pub async fn delete(&self, request: PendingRequest) -> Result<(), ClientError> {
        self.send(&request).await?;
        Ok(())
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<Option<T>, ClientError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let request = self.request(method, path).json(body)?;
        Ok(self.send(&request).await?.json()?)
    }
}

impl std::fmt::Debug for ApiCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCore")
            .field("server_url", &self.server_url())
            .field("session", &self.session)
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

/// Unwraps a body the endpoint must always send.
pub(crate) fn required<T>(value: Option<T>, path: &str) -> Result<T, ClientError> {
    value.ok_or_else(|| ClientError::EmptyResponse(path.to_string()))
}
