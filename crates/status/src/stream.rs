//! Typed reading of the status feed.

use std::time::Duration;

use futures::stream::{self, Stream};
use protocol::{decode_frame, ApiError, FrameError, ZoneStatusFrame};
use thiserror::Error;
use transport::{FrameLines, SessionAuthenticator};

/// Why the next frame could not be produced.
#[derive(Debug, Error)]
pub enum StatusStreamError {
    /// The connection failed, went silent, or the server refused it.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A line arrived that is not a zone-status frame.
    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl StatusStreamError {
    /// `true` when reconnecting is a reasonable response.
    pub fn is_transient(&self) -> bool {
        match self {
            StatusStreamError::Api(e) => e.is_retryable(),
            StatusStreamError::Frame(_) => true,
        }
    }
}

/// Zone-status frames decoded from one open feed connection.
#[derive(Debug)]
pub struct ZoneStatusStream {
    lines: FrameLines,
}

impl ZoneStatusStream {
    pub fn new(lines: FrameLines) -> Self {
        Self { lines }
    }

    /// Opens the feed at `path`.
    pub async fn open(
        session: &SessionAuthenticator,
        path: &str,
        inter_frame_timeout: Option<Duration>,
    ) -> Result<Self, ApiError> {
        let lines = session.open_stream(path, inter_frame_timeout).await?;
        Ok(Self::new(lines))
    }

    /// Returns the next frame, or `None` once the server has closed the feed.
    pub async fn next_frame(&mut self) -> Result<Option<ZoneStatusFrame>, StatusStreamError> {
        match self.lines.next_line().await? {
            Some(line) => Ok(Some(decode_frame(&line)?)),
            None => Ok(None),
        }
    }

    /// Adapts the feed into a [`Stream`]. The stream ends after the feed
    /// closes or after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<ZoneStatusFrame, StatusStreamError>> + Send {
        stream::unfold(Some(self), |state| async move {
            let mut this = state?;
            match this.next_frame().await {
                Ok(Some(frame)) => Some((Ok(frame), Some(this))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}
