use std::time::Duration;

use protocol::{ApiError, ErrorKind, FrameError, TransportFailure};
use thiserror::Error;

/// Every way a client call can fail.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server, or the connection to it, reported a failure.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The response body did not have the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unexpected zone-status payload: {0}")]
    Frame(#[from] FrameError),

    /// The endpoint answered with an empty body where a value was required.
    #[error("{0} returned an empty body")]
    EmptyResponse(String),

    #[error("invalid server URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("the server did not become ready within {0:?}")]
    ServerStartTimeout(Duration),

    /// The HTTP client itself could not be constructed.
    #[error("could not set up the HTTP client: {0}")]
    Setup(#[from] TransportFailure),
}

impl ClientError {
    /// The server-side kind, for errors that carry one.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ClientError::Api(e) => Some(e.kind()),
            _ => None,
        }
    }
}
