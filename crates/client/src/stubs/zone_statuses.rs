use std::sync::Arc;
use std::time::Duration;

use protocol::{decode_frame, Method, ZoneStatusFrame};
use status::ZoneStatusStream;

use crate::base::ApiCore;
use crate::error::ClientError;

const LATEST_PATH: &str = "/api/streams/status";
const FEED_PATH: &str = "/api/streams/statuses";

/// Zone-status endpoints.
#[derive(Debug, Clone)]
pub struct ZoneStatusStub {
    core: Arc<ApiCore>,
}

impl ZoneStatusStub {
    pub fn new(core: Arc<ApiCore>) -> Self {
        Self { core }
    }

    /// The latest status of every zone of every active stream, in one call.
    pub async fn get_latest_zone_statuses(&self) -> Result<ZoneStatusFrame, ClientError> {
        let raw = self.core.send(&self.core.request(Method::Get, LATEST_PATH)).await?;
        if raw.body.is_empty() {
            return Ok(ZoneStatusFrame::new());
        }
        Ok(decode_frame(&raw.body)?)
    }

    /// Opens the live status feed. `timeout` bounds the wait for each frame;
    /// `None` waits forever.
    ///
    /// For a feed that survives disconnects use the status receiver instead.
    pub async fn get_zone_status_stream(&self, timeout: Option<Duration>) -> Result<ZoneStatusStream, ClientError> {
        Ok(ZoneStatusStream::open(self.core.session(), FEED_PATH, timeout).await?)
    }
}
