//! Zone-status payloads and the frames of the status feed.
//!
//! The status payload itself belongs to the server's data model; this crate
//! only moves it. [`ZoneStatus`] keeps the decoded JSON and offers typed
//! access for callers that bring their own model.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::StreamId;

/// Zone name to status, for one stream.
pub type ZoneStatuses = HashMap<String, ZoneStatus>;

/// One decoded line of the status feed: stream to zone name to status.
pub type ZoneStatusFrame = HashMap<StreamId, ZoneStatuses>;

/// The status of one zone at one instant, as sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneStatus(serde_json::Value);

impl ZoneStatus {
    pub fn from_value(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Decodes the payload into a caller-supplied model.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.0)
    }

    /// The time the server produced this status (`tstamp`, Unix seconds).
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let seconds = self.0.get("tstamp")?.as_f64()?;
        let whole = seconds.floor();
        let nanos = ((seconds - whole) * 1e9).round() as u32;
        DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
    }

    /// The name of the zone this status describes (`zone.name`).
    pub fn zone_name(&self) -> Option<&str> {
        self.0.get("zone")?.get("name")?.as_str()
    }
}

/// A feed line that could not be decoded into a frame.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame key '{0}' is not a stream ID")]
    StreamKey(String),
}

/// Decodes one feed line.
pub fn decode_frame(line: &[u8]) -> Result<ZoneStatusFrame, FrameError> {
    let raw: HashMap<String, ZoneStatuses> = serde_json::from_slice(line)?;
    raw.into_iter()
        .map(|(key, statuses)| {
            key.parse::<StreamId>()
                .map(|id| (id, statuses))
                .map_err(|_| FrameError::StreamKey(key))
        })
        .collect()
}
