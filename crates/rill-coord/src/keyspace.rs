//! Structured coordination-store keys.
//!
//! Every rill key lives under the `/rill` prefix:
//!
//! ```text
//! /rill/owner/<lease-id>
//! /rill/capture/<capture-id>
//! /rill/changefeed/info/<changefeed-id>
//! /rill/changefeed/status/<changefeed-id>
//! /rill/task/position/<capture-id>/<changefeed-id>
//! /rill/task/status/<capture-id>/<changefeed-id>
//! /rill/task/workload/<capture-id>/<changefeed-id>
//! ```
//!
//! [`MetaKey::parse`] and the `Display` impl round-trip.

use std::fmt;

use rill_model::{CaptureId, ChangefeedId};

use crate::CoordError;

const PREFIX: &str = "/rill";

/// A parsed coordination-store key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetaKey {
    /// Leased owner-election key.
    Owner {
        /// Lease identifier backing the owner's election session.
        lease_id: String,
    },
    /// Leased capture heartbeat key.
    Capture {
        /// The capture the record describes.
        capture_id: CaptureId,
    },
    /// A changefeed's configuration record.
    ChangefeedInfo {
        /// The changefeed.
        changefeed_id: ChangefeedId,
    },
    /// A changefeed's progress record.
    ChangefeedStatus {
        /// The changefeed.
        changefeed_id: ChangefeedId,
    },
    /// A capture's position within a changefeed.
    TaskPosition {
        /// The reporting capture.
        capture_id: CaptureId,
        /// The changefeed.
        changefeed_id: ChangefeedId,
    },
    /// A capture's table assignments within a changefeed.
    TaskStatus {
        /// The reporting capture.
        capture_id: CaptureId,
        /// The changefeed.
        changefeed_id: ChangefeedId,
    },
    /// A capture's workload report within a changefeed.
    TaskWorkload {
        /// The reporting capture.
        capture_id: CaptureId,
        /// The changefeed.
        changefeed_id: ChangefeedId,
    },
}

impl MetaKey {
    /// Parses a raw store key.
    ///
    /// # Errors
    ///
    /// [`CoordError::InvalidKey`] when the key is outside the `/rill`
    /// prefix or structurally malformed; [`CoordError::UnknownKey`]
    /// when the prefix is right but the tag is unrecognised (callers
    /// typically log and skip these).
    pub fn parse(raw: &str) -> Result<Self, CoordError> {
        let rest = raw
            .strip_prefix(PREFIX)
            .and_then(|r| r.strip_prefix('/'))
            .ok_or_else(|| CoordError::InvalidKey(raw.to_string()))?;

        let mut segments = rest.splitn(2, '/');
        let tag = segments.next().unwrap_or_default();
        let tail = segments.next();

        match (tag, tail) {
            ("owner", Some(lease_id)) if !lease_id.is_empty() => Ok(MetaKey::Owner {
                lease_id: lease_id.to_string(),
            }),
            ("capture", Some(capture_id)) if !capture_id.is_empty() => Ok(MetaKey::Capture {
                capture_id: capture_id.to_string(),
            }),
            ("changefeed", Some(tail)) => match tail.split_once('/') {
                Some(("info", id)) if !id.is_empty() => Ok(MetaKey::ChangefeedInfo {
                    changefeed_id: id.to_string(),
                }),
                Some(("status", id)) if !id.is_empty() => Ok(MetaKey::ChangefeedStatus {
                    changefeed_id: id.to_string(),
                }),
                _ => Err(CoordError::UnknownKey(raw.to_string())),
            },
            ("task", Some(tail)) => {
                let mut parts = tail.splitn(3, '/');
                let kind = parts.next().unwrap_or_default();
                let capture = parts.next().unwrap_or_default();
                let changefeed = parts.next().unwrap_or_default();
                if capture.is_empty() || changefeed.is_empty() {
                    return Err(CoordError::InvalidKey(raw.to_string()));
                }
                let capture_id = capture.to_string();
                let changefeed_id = changefeed.to_string();
                match kind {
                    "position" => Ok(MetaKey::TaskPosition {
                        capture_id,
                        changefeed_id,
                    }),
                    "status" => Ok(MetaKey::TaskStatus {
                        capture_id,
                        changefeed_id,
                    }),
                    "workload" => Ok(MetaKey::TaskWorkload {
                        capture_id,
                        changefeed_id,
                    }),
                    _ => Err(CoordError::UnknownKey(raw.to_string())),
                }
            }
            _ => Err(CoordError::UnknownKey(raw.to_string())),
        }
    }

    /// The changefeed this key belongs to, if any.
    #[must_use]
    pub fn changefeed_id(&self) -> Option<&ChangefeedId> {
        match self {
            MetaKey::ChangefeedInfo { changefeed_id }
            | MetaKey::ChangefeedStatus { changefeed_id }
            | MetaKey::TaskPosition { changefeed_id, .. }
            | MetaKey::TaskStatus { changefeed_id, .. }
            | MetaKey::TaskWorkload { changefeed_id, .. } => Some(changefeed_id),
            MetaKey::Owner { .. } | MetaKey::Capture { .. } => None,
        }
    }
}

impl fmt::Display for MetaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaKey::Owner { lease_id } => write!(f, "{PREFIX}/owner/{lease_id}"),
            MetaKey::Capture { capture_id } => write!(f, "{PREFIX}/capture/{capture_id}"),
            MetaKey::ChangefeedInfo { changefeed_id } => {
                write!(f, "{PREFIX}/changefeed/info/{changefeed_id}")
            }
            MetaKey::ChangefeedStatus { changefeed_id } => {
                write!(f, "{PREFIX}/changefeed/status/{changefeed_id}")
            }
            MetaKey::TaskPosition {
                capture_id,
                changefeed_id,
            } => write!(f, "{PREFIX}/task/position/{capture_id}/{changefeed_id}"),
            MetaKey::TaskStatus {
                capture_id,
                changefeed_id,
            } => write!(f, "{PREFIX}/task/status/{capture_id}/{changefeed_id}"),
            MetaKey::TaskWorkload {
                capture_id,
                changefeed_id,
            } => write!(f, "{PREFIX}/task/workload/{capture_id}/{changefeed_id}"),
        }
    }
}
