use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc;
use futures::StreamExt;
use protocol::{Body, Method, PendingRequest, TransportFailure};

use crate::transport::{Authorization, HttpResponse, Transport};

/// One scripted outcome of [`MockTransport::execute`].
pub enum MockReply {
    /// A complete response.
    Response {
        status: u16,
        headers: Vec<(String, String)>,
        session_id: Option<String>,
        body: Vec<u8>,
    },
    /// A response whose body is fed through a [`StreamFeed`].
    Stream {
        status: u16,
        session_id: Option<String>,
        chunks: mpsc::UnboundedReceiver<Result<Bytes, TransportFailure>>,
    },
    /// No response at all.
    Failure(TransportFailure),
}

impl MockReply {
    pub fn empty(status: u16) -> Self {
        MockReply::Response {
            status,
            headers: Vec::new(),
            session_id: None,
            body: Vec::new(),
        }
    }

    pub fn json(status: u16, value: serde_json::Value) -> Self {
        MockReply::Response {
            status,
            headers: vec![("content-type".into(), "application/json".into())],
            session_id: None,
            body: value.to_string().into_bytes(),
        }
    }

    /// A server-declared error body `{"title": kind, "description": ...}`.
    pub fn error(status: u16, kind: &str, description: &str) -> Self {
        Self::json(
            status,
            serde_json::json!({ "title": kind, "description": description }),
        )
    }

    /// A streamed 200 response and the feed that writes its body.
    pub fn stream() -> (Self, StreamFeed) {
        Self::stream_with_status(200)
    }

    /// A streamed response with any status, e.g. an error body that stalls.
    pub fn stream_with_status(status: u16) -> (Self, StreamFeed) {
        let (tx, rx) = mpsc::unbounded();
        (
            MockReply::Stream {
                status,
                session_id: None,
                chunks: rx,
            },
            StreamFeed { tx },
        )
    }

    /// Sets the `session_id` cookie on the reply.
    pub fn with_session(mut self, token: &str) -> Self {
        match &mut self {
            MockReply::Response { session_id, .. } | MockReply::Stream { session_id, .. } => {
                *session_id = Some(token.to_string());
            }
            MockReply::Failure(_) => {}
        }
        self
    }
}

/// Writes the body of a [`MockReply::stream`] response. Dropping the feed
/// ends the body.
#[derive(Clone)]
pub struct StreamFeed {
    tx: mpsc::UnboundedSender<Result<Bytes, TransportFailure>>,
}

impl StreamFeed {
    /// Sends `frame` followed by the CRLF delimiter. Returns `false` once the
    /// reader has gone away.
    pub fn send_frame(&self, frame: &serde_json::Value) -> bool {
        self.send_raw(format!("{frame}\r\n").into_bytes())
    }

    pub fn send_raw(&self, bytes: impl Into<Bytes>) -> bool {
        self.tx.unbounded_send(Ok(bytes.into())).is_ok()
    }

    /// Breaks the body with `failure`.
    pub fn fail(&self, failure: TransportFailure) -> bool {
        self.tx.unbounded_send(Err(failure)).is_ok()
    }

    /// Ends the body, as the server closing the connection would.
    pub fn close(&self) {
        self.tx.close_channel();
    }
}

/// A request as seen by [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Body,
    pub authorization: Authorization,
}

/// A scripted [`Transport`] for tests.
///
/// Replies are consumed in order. When the script runs dry every call fails
/// with [`TransportFailure::Connect`], which is what an unreachable server
/// looks like.
///
/// # Example
///
/// ```ignore
/// let mock = Arc::new(MockTransport::new());
/// mock.push(MockReply::json(200, json!("0.29.1")));
///
/// let session = SessionAuthenticator::new(mock.clone(), Arc::new(ErrorRegistry::builtin()));
/// session.send(&PendingRequest::get("/api/version")).await?;
///
/// assert_eq!(mock.calls()[0].path, "/api/version");
/// ```
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<MockReply>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a reply to the script.
    pub fn push(&self, reply: MockReply) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
    }

    /// Returns all calls made so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Waits until at least `count` calls have been made. Returns `false` if
    /// that did not happen within `within`.
    pub async fn wait_for_calls(&self, count: usize, within: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        while self.call_count() < count {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        true
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(
        &self,
        request: &PendingRequest,
        authorization: &Authorization,
    ) -> Result<HttpResponse, TransportFailure> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedCall {
                method: request.method(),
                path: request.path().to_string(),
                query: request.query_params().to_vec(),
                body: request.body().clone(),
                authorization: authorization.clone(),
            });

        let reply = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        match reply {
            Some(MockReply::Response {
                status,
                headers,
                session_id,
                body,
            }) => Ok(HttpResponse {
                status,
                headers: headers.into_iter().collect::<BTreeMap<_, _>>(),
                session_id,
                body: futures::stream::iter(vec![Ok(Bytes::from(body))]).boxed(),
            }),
            Some(MockReply::Stream {
                status,
                session_id,
                chunks,
            }) => Ok(HttpResponse {
                status,
                headers: BTreeMap::new(),
                session_id,
                body: chunks.boxed(),
            }),
            Some(MockReply::Failure(failure)) => Err(failure),
            None => Err(TransportFailure::Connect("no scripted reply".into())),
        }
    }
}
