//! Client configuration.
//!
//! [`ClientConfig`] is plain data: it can be deserialised from a file, built
//! from command-line flags, or constructed in code. Validation happens when
//! the client is built from it.

use std::time::Duration;

use protocol::DEFAULT_TIMEOUT;
use serde::{Deserialize, Serialize};
use status::StatusReceiverConfig;
use transport::Credentials;
use url::Url;

use crate::error::ClientError;

/// Everything needed to talk to one BrainFrame server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the server, e.g. `http://localhost`. Requests fail until
    /// one is set.
    pub server_url: Option<String>,

    /// Login for servers with authentication enabled.
    pub credentials: Option<LoginConfig>,

    /// Timeout for ordinary requests.
    pub default_timeout: Duration,

    pub status: StatusReceiverConfig,
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: Some(server_url.into()),
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(LoginConfig {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Parses and checks [`ClientConfig::server_url`].
    pub fn parsed_server_url(&self) -> Result<Option<Url>, ClientError> {
        self.server_url.as_deref().map(parse_server_url).transpose()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            credentials: None,
            default_timeout: DEFAULT_TIMEOUT,
            status: StatusReceiverConfig::default(),
        }
    }
}

/// Username and password as they appear in configuration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginConfig {
    pub username: String,
    pub password: String,
}

impl From<LoginConfig> for Credentials {
    fn from(login: LoginConfig) -> Self {
        Credentials::new(login.username, login.password)
    }
}

impl std::fmt::Debug for LoginConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Parses a server URL, accepting only `http` and `https`.
pub fn parse_server_url(raw: &str) -> Result<Url, ClientError> {
    let url = Url::parse(raw).map_err(|e| ClientError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ClientError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{other}://', must be http:// or https://"),
        }),
    }
}
