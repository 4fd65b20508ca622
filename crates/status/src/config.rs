use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where the status feed lives and how patiently to read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusReceiverConfig {
    /// Path of the streamed status endpoint.
    pub path: String,

    /// Longest gap tolerated between two frames before the connection is
    /// treated as dead.
    pub inter_frame_timeout: Duration,

    /// Pause between a lost connection and the next attempt.
    pub reconnect_delay: Duration,
}

impl StatusReceiverConfig {
    pub const DEFAULT_PATH: &'static str = "/api/streams/statuses";
    pub const DEFAULT_INTER_FRAME_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);
}

impl Default for StatusReceiverConfig {
    fn default() -> Self {
        Self {
            path: Self::DEFAULT_PATH.to_string(),
            inter_frame_timeout: Self::DEFAULT_INTER_FRAME_TIMEOUT,
            reconnect_delay: Self::DEFAULT_RECONNECT_DELAY,
        }
    }
}
