//! Splits a streamed response body into CRLF-delimited lines.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use protocol::{ApiError, ErrorRegistry, TransportFailure};

use crate::transport::ResponseBody;

const DELIMITER: &[u8] = b"\r\n";

/// Longest line accepted before the stream is failed.
pub const DEFAULT_MAX_LINE_LEN: usize = 16 * 1024 * 1024;

/// Line-by-line reader over a streamed body.
///
/// Blank lines are skipped. A partial line left when the body ends is
/// returned as a final line. If `idle_timeout` is set, waiting longer than it
/// for the next chunk fails with [`TransportFailure::Silent`], translated like
/// every other transport failure. A line longer than the maximum fails with
/// [`TransportFailure::LineTooLong`].
pub struct FrameLines {
    body: ResponseBody,
    buffer: Vec<u8>,
    /// Bytes of `buffer` already searched for the delimiter.
    scanned: usize,
    max_line_len: usize,
    idle_timeout: Option<Duration>,
    finished: bool,
    registry: Arc<ErrorRegistry>,
}

impl FrameLines {
    pub fn new(body: ResponseBody, idle_timeout: Option<Duration>, registry: Arc<ErrorRegistry>) -> Self {
        Self {
            body,
            buffer: Vec::new(),
            scanned: 0,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            idle_timeout,
            finished: false,
            registry,
        }
    }

    pub fn with_max_line_len(mut self, max_line_len: usize) -> Self {
        self.max_line_len = max_line_len;
        self
    }

    /// Returns the next non-blank line without its delimiter, or `None` once
    /// the body has ended.
    pub async fn next_line(&mut self) -> Result<Option<Vec<u8>>, ApiError> {
        loop {
            if let Some(line) = self.take_line() {
                return Ok(Some(line));
            }

            if self.buffer.len() > self.max_line_len {
                let failure = TransportFailure::LineTooLong(self.max_line_len);
                return Err(self.registry.translate_failure(failure));
            }

            if self.finished {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                self.scanned = 0;
                return Ok(Some(std::mem::take(&mut self.buffer)));
            }

            match self.next_chunk().await {
                Ok(Some(chunk)) => self.buffer.extend_from_slice(&chunk),
                Ok(None) => self.finished = true,
                Err(failure) => return Err(self.registry.translate_failure(failure)),
            }
        }
    }

    fn take_line(&mut self) -> Option<Vec<u8>> {
        while let Some(found) = find(&self.buffer[self.scanned..], DELIMITER) {
            let pos = self.scanned + found;
            self.scanned = 0;
            let mut line: Vec<u8> = self.buffer.drain(..pos + DELIMITER.len()).collect();
            line.truncate(pos);
            if !line.is_empty() {
                return Some(line);
            }
        }
        // A delimiter may straddle the next chunk boundary.
        self.scanned = self.buffer.len().saturating_sub(DELIMITER.len() - 1);
        None
    }

    async fn next_chunk(&mut self) -> Result<Option<bytes::Bytes>, TransportFailure> {
        let next = match self.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, self.body.next())
                .await
                .map_err(|_| TransportFailure::Silent(limit))?,
            None => self.body.next().await,
        };
        next.transpose()
    }
}

impl std::fmt::Debug for FrameLines {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLines")
            .field("buffered", &self.buffer.len())
            .field("max_line_len", &self.max_line_len)
            .field("idle_timeout", &self.idle_timeout)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures::stream;
    use protocol::ErrorKind;

    use super::*;

    fn lines_from(chunks: &[&'static str], idle_timeout: Option<Duration>) -> FrameLines {
        let body = stream::iter(
            chunks
                .iter()
                .map(|c| Ok(Bytes::from_static(c.as_bytes())))
                .collect::<Vec<_>>(),
        )
        .boxed();
        FrameLines::new(body, idle_timeout, Arc::new(ErrorRegistry::builtin()))
    }

    #[tokio::test]
    async fn test_lines_split_across_chunks() {
        let mut lines = lines_from(&["{\"a\"", ":1}\r", "\n{\"b\":2}\r\n"], None);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), br#"{"a":1}"#);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), br#"{"b":2}"#);
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_blank_lines_are_skipped() {
        let mut lines = lines_from(&["\r\n\r\none\r\n\r\ntwo\r\n"], None);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), b"one");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), b"two");
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_trailing_partial_line_is_returned() {
        let mut lines = lines_from(&["one\r\ntail"], None);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), b"one");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), b"tail");
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delimiter_split_between_chunks() {
        let mut lines = lines_from(&["one\r", "\ntwo", "\r", "\nthree\r\n"], None);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), b"one");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), b"two");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), b"three");
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_line_split_over_many_chunks() {
        let chunks: Vec<&'static str> = std::iter::repeat("ab").take(500).chain(["\r\n"]).collect();
        let mut lines = lines_from(&chunks, None);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "ab".repeat(500).into_bytes());
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_overlong_line_fails_the_stream() {
        let mut lines = lines_from(&["short\r\n", "0123", "456789", "abc\r\n"], None).with_max_line_len(8);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), b"short");
        let err = lines.next_line().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServerNotReady);
        assert_eq!(err.cause(), Some(&TransportFailure::LineTooLong(8)));
    }

    #[tokio::test]
    async fn test_silent_stream_fails_as_server_not_ready() {
        let body = stream::pending::<Result<Bytes, TransportFailure>>().boxed();
        let mut lines = FrameLines::new(
            body,
            Some(Duration::from_millis(20)),
            Arc::new(ErrorRegistry::builtin()),
        );
        let err = lines.next_line().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServerNotReady);
        assert_eq!(err.cause(), Some(&TransportFailure::Silent(Duration::from_millis(20))));
    }

    #[tokio::test]
    async fn test_body_failure_is_translated() {
        let body = stream::iter(vec![
            Ok(Bytes::from_static(b"one\r\n")),
            Err(TransportFailure::Interrupted("reset by peer".into())),
        ])
        .boxed();
        let mut lines = FrameLines::new(body, None, Arc::new(ErrorRegistry::builtin()));
        assert_eq!(lines.next_line().await.unwrap().unwrap(), b"one");
        assert_eq!(lines.next_line().await.unwrap_err().kind(), ErrorKind::ServerNotReady);
    }
}
