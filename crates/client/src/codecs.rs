//! Request and response bodies for the stubs in this crate.

use protocol::{PremisesId, StreamId};
use serde::{Deserialize, Serialize};

/// Free-form option values keyed by option name.
pub type Options = serde_json::Map<String, serde_json::Value>;

/// How BrainFrame reaches a video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnType {
    /// A network camera speaking RTSP or HTTP. Options: `url`, optional
    /// `pipeline`.
    IpCamera,
    /// A local V4L device. Options: `device_id`.
    Webcam,
    /// A previously uploaded video. Options: `storage_id`, optional
    /// `transcode` and `pipeline`.
    File,
}

/// A video stream BrainFrame may connect to and analyze.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfiguration {
    pub name: String,
    pub connection_type: ConnType,
    /// Connection details; the keys depend on `connection_type`.
    pub connection_options: Options,
    pub runtime_options: Options,
    pub premises_id: Option<PremisesId>,
    #[serde(default)]
    pub metadata: Options,
    /// Assigned by the server. `None` for a configuration that has not been
    /// created yet.
    #[serde(default)]
    pub id: Option<StreamId>,
}

impl StreamConfiguration {
    /// A configuration for a new stream, with no options set.
    pub fn new(name: impl Into<String>, connection_type: ConnType, connection_options: Options) -> Self {
        Self {
            name: name.into(),
            connection_type,
            connection_options,
            runtime_options: Options::new(),
            premises_id: None,
            metadata: Options::new(),
            id: None,
        }
    }
}
