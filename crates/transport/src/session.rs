//! Per-request authentication with automatic session acquisition and
//! session-expiry recovery.
//!
//! ## States
//!
//! | State | Sends | Leaves on |
//! |-------|-------|-----------|
//! | `NoAuth` | nothing | credentials set |
//! | `NeedsSession` | HTTP Basic | a response carrying a `session_id` cookie |
//! | `HasSession` | `session_id` cookie | `InvalidSessionError`, credentials replaced |
//!
//! A rejected session is retried exactly once with credentials. Callers only
//! ever see a success response or an [`ApiError`].

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use protocol::{ApiError, ErrorKind, ErrorRegistry, PendingRequest, RawResponse, ReadMode, RequestId};
use tracing::{debug, instrument};

use crate::lines::FrameLines;
use crate::transport::{Authorization, Credentials, HttpResponse, Transport};

#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionState {
    NoAuth,
    NeedsSession(Credentials),
    HasSession { credentials: Credentials, token: String },
}

/// Wraps a [`Transport`] with session handling and error translation.
///
/// Safe to share between the status receiver and ordinary callers: the
/// session state sits behind a mutex that is never held across an `.await`.
pub struct SessionAuthenticator {
    transport: Arc<dyn Transport>,
    registry: Arc<ErrorRegistry>,
    state: Mutex<SessionState>,
}

impl SessionAuthenticator {
    pub fn new(transport: Arc<dyn Transport>, registry: Arc<ErrorRegistry>) -> Self {
        Self {
            transport,
            registry,
            state: Mutex::new(SessionState::NoAuth),
        }
    }

    /// Replaces the credentials used for all future requests and discards
    /// any cached session. `None` stops authenticating requests.
    pub fn set_credentials(&self, credentials: Option<Credentials>) {
        *self.lock_state() = match credentials {
            Some(credentials) => SessionState::NeedsSession(credentials),
            None => SessionState::NoAuth,
        };
    }

    pub fn credentials(&self) -> Option<Credentials> {
        match &*self.lock_state() {
            SessionState::NoAuth => None,
            SessionState::NeedsSession(credentials) | SessionState::HasSession { credentials, .. } => {
                Some(credentials.clone())
            }
        }
    }

    pub fn registry(&self) -> &Arc<ErrorRegistry> {
        &self.registry
    }

    /// Sends `request` and reads the whole response body.
    pub async fn send(&self, request: &PendingRequest) -> Result<RawResponse, ApiError> {
        let response = self.execute(request).await?;
        response
            .into_raw()
            .await
            .map_err(|failure| self.registry.translate_failure(failure))
    }

    /// Opens a streamed GET on `path` and returns its lines. Frames arriving
    /// more than `inter_frame_timeout` apart fail the stream.
    pub async fn open_stream(&self, path: &str, inter_frame_timeout: Option<Duration>) -> Result<FrameLines, ApiError> {
        let request = PendingRequest::streaming(path, inter_frame_timeout);
        let response = self.execute(&request).await?;
        Ok(FrameLines::new(
            response.body,
            inter_frame_timeout,
            Arc::clone(&self.registry),
        ))
    }

    /// Sends `request` with whatever authentication the current state calls
    /// for and returns the successful response with its body unread.
    #[instrument(
        name = "api_request",
        skip_all,
        fields(request_id = %RequestId::new_random(), method = %request.method(), path = request.path())
    )]
    pub async fn execute(&self, request: &PendingRequest) -> Result<HttpResponse, ApiError> {
        let state = self.lock_state().clone();
        match state {
            SessionState::NoAuth => self.attempt(request, &Authorization::None).await,
            SessionState::NeedsSession(credentials) => self.attempt_with_credentials(request, credentials).await,
            SessionState::HasSession { credentials, token } => {
                match self.attempt(request, &Authorization::Session(token.clone())).await {
                    Err(e) if e.kind() == ErrorKind::InvalidSession => {
                        debug!("session rejected; authenticating again");
                        self.invalidate_session(&token);
                        self.attempt_with_credentials(request, credentials).await
                    }
                    other => other,
                }
            }
        }
    }

    async fn attempt_with_credentials(
        &self,
        request: &PendingRequest,
        credentials: Credentials,
    ) -> Result<HttpResponse, ApiError> {
        let response = self
            .attempt(request, &Authorization::Basic(credentials.clone()))
            .await?;
        if let Some(token) = &response.session_id {
            self.store_session(credentials, token.clone());
        }
        Ok(response)
    }

    async fn attempt(&self, request: &PendingRequest, authorization: &Authorization) -> Result<HttpResponse, ApiError> {
        let response = self
            .transport
            .execute(request, authorization)
            .await
            .map_err(|failure| self.registry.translate_failure(failure))?;

        if response.is_success() {
            return Ok(response);
        }

        // Streamed requests carry no overall deadline; each error-body chunk
        // gets the inter-frame limit instead.
        let idle_timeout = match request.read_mode() {
            ReadMode::Streamed => request.timeout_duration(),
            ReadMode::Buffered => None,
        };
        let status = response.status;
        let raw = response
            .into_raw_within(idle_timeout)
            .await
            .map_err(|failure| self.registry.translate_failure(failure))?;
        Err(self.registry.translate_response(status, &raw.body))
    }

    /// Caches `token` unless the credentials it was issued for have been
    /// replaced while the request was in flight.
    fn store_session(&self, credentials: Credentials, token: String) {
        let mut state = self.lock_state();
        let current = match &*state {
            SessionState::NoAuth => return,
            SessionState::NeedsSession(c) | SessionState::HasSession { credentials: c, .. } => c,
        };
        if *current == credentials {
            debug!("session established");
            *state = SessionState::HasSession { credentials, token };
        }
    }

    /// Drops `token` if it is still the cached one; a concurrent caller may
    /// already have replaced it.
    fn invalidate_session(&self, token: &str) {
        let mut state = self.lock_state();
        let next = match &*state {
            SessionState::HasSession { credentials, token: cached } if cached == token => {
                SessionState::NeedsSession(credentials.clone())
            }
            _ => return,
        };
        *state = next;
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for SessionAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match &*self.lock_state() {
            SessionState::NoAuth => "NoAuth",
            SessionState::NeedsSession(_) => "NeedsSession",
            SessionState::HasSession { .. } => "HasSession",
        };
        f.debug_struct("SessionAuthenticator")
            .field("state", &phase)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
