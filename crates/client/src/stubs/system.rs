use std::sync::Arc;
use std::time::Duration;

use protocol::{ErrorKind, Method};
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::base::{required, ApiCore};
use crate::error::ClientError;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Server-wide endpoints.
#[derive(Debug, Clone)]
pub struct SystemStub {
    core: Arc<ApiCore>,
}

impl SystemStub {
    pub fn new(core: Arc<ApiCore>) -> Self {
        Self { core }
    }

    /// The server version, `X.Y.Z`.
    pub async fn version(&self) -> Result<String, ClientError> {
        self.version_within(None).await
    }

    /// [`SystemStub::version`] with the request timeout capped at `budget`.
    async fn version_within(&self, budget: Option<Duration>) -> Result<String, ClientError> {
        const PATH: &str = "/api/version";
        let mut request = self.core.request(Method::Get, PATH);
        if let Some(budget) = budget {
            let capped = request.timeout_duration().map_or(budget, |t| t.min(budget));
            request = request.timeout(Some(capped));
        }
        let (version, _) = self.core.get_json(request).await?;
        required(version, PATH)
    }

    /// Polls [`SystemStub::version`] until the server answers.
    ///
    /// While the server starts it may be unreachable, sit behind a proxy that
    /// answers 502, or reject requests before its user database is loaded;
    /// all of these are waited out. Any other error is returned at once.
    /// `None` waits indefinitely; otherwise no single attempt outlives the
    /// time left.
    #[instrument(skip(self))]
    pub async fn wait_for_server_initialization(&self, timeout: Option<Duration>) -> Result<(), ClientError> {
        let started = Instant::now();
        loop {
            let remaining = match timeout {
                Some(limit) => match limit.checked_sub(started.elapsed()) {
                    Some(left) if !left.is_zero() => Some(left),
                    _ => return Err(ClientError::ServerStartTimeout(limit)),
                },
                None => None,
            };

            match self.version_within(remaining).await {
                Ok(version) => {
                    debug!(%version, "server is ready");
                    return Ok(());
                }
                Err(ClientError::Api(e)) if matches!(e.kind(), ErrorKind::ServerNotReady | ErrorKind::Unauthorized) => {
                    debug!(error = %e, "server not ready yet");
                }
                Err(e) => return Err(e),
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}
