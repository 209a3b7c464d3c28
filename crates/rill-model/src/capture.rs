//! Capture descriptors.
//!
//! A capture is one worker process that may host part of a changefeed.
//! Captures advertise themselves in the coordination store under a
//! leased key; the record disappearing means the capture's heartbeat
//! lapsed.

use serde::{Deserialize, Serialize};

use crate::CaptureId;

/// Node descriptor stored under a capture's leased key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureInfo {
    /// Unique identifier of the capture process.
    pub id: CaptureId,

    /// Address other nodes use to reach this capture.
    #[serde(rename = "address")]
    pub advertise_addr: String,

    /// Release version the capture is running.
    #[serde(default)]
    pub version: String,
}

impl CaptureInfo {
    /// Decodes a capture record from its JSON store value.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ModelError::Decode`] if the bytes are not a
    /// valid capture record.
    pub fn from_json(value: &[u8]) -> Result<Self, crate::ModelError> {
        Ok(serde_json::from_slice(value)?)
    }
}
