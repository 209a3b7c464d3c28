//! Changefeed metadata.
//!
//! `ChangeFeedInfo` is the administrator-declared configuration of a
//! replication job; `ChangeFeedStatus` is its advancing progress
//! record. Both are stored as JSON in the coordination store and
//! mutated exclusively through reactor-state patches.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::ReplicaConfig;
use crate::{ModelError, Ts};

/// Lifecycle state of a changefeed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedState {
    /// Replicating normally.
    #[default]
    Normal,
    /// Hit a retryable error; will resume.
    Error,
    /// Hit a fatal error; paused until operator action.
    Failed,
    /// Paused by the operator.
    Stopped,
    /// Removed by the operator.
    Removed,
    /// Reached its target-ts.
    Finished,
}

/// Last error recorded against a changefeed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningError {
    /// Address of the capture that observed the error.
    #[serde(default)]
    pub addr: String,
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// Administrator-declared changefeed configuration.
///
/// Mostly immutable after creation; the owner only touches `state` and
/// `error` (when pausing on a fatal error) and operators may adjust
/// `target_ts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeFeedInfo {
    /// Where events are shipped, e.g. `kafka://...` or `blackhole://`.
    #[serde(rename = "sink-uri")]
    pub sink_uri: String,

    /// Timestamp replication starts from.
    #[serde(rename = "start-ts")]
    pub start_ts: Ts,

    /// Timestamp replication stops at; zero means unbounded.
    #[serde(rename = "target-ts", default)]
    pub target_ts: Ts,

    /// Lifecycle state.
    #[serde(default)]
    pub state: FeedState,

    /// Last error, preserved across pauses.
    #[serde(default)]
    pub error: Option<RunningError>,

    /// Whether syncpoint records are written downstream.
    #[serde(rename = "sync-point-enabled", default)]
    pub sync_point_enabled: bool,

    /// Replication configuration; filled with defaults when absent.
    #[serde(default)]
    pub config: Option<ReplicaConfig>,

    /// Free-form sink options.
    #[serde(default)]
    pub opts: HashMap<String, String>,
}

impl ChangeFeedInfo {
    /// Decodes an info record from its JSON store value and normalises
    /// it via [`verify_and_fix`](Self::verify_and_fix).
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Decode`] for malformed JSON and
    /// [`ModelError::InvalidChangefeed`] when validation fails.
    pub fn from_json(value: &[u8]) -> Result<Self, ModelError> {
        let mut info: Self = serde_json::from_slice(value)?;
        info.verify_and_fix()?;
        Ok(info)
    }

    /// Normalises optional fields written by older versions and
    /// validates the record.
    ///
    /// A missing `config` becomes the default; empty filter rules
    /// become the match-all rule.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidChangefeed`] when the sink URI is
    /// empty or `start_ts` is zero.
    pub fn verify_and_fix(&mut self) -> Result<(), ModelError> {
        if self.sink_uri.is_empty() {
            return Err(ModelError::InvalidChangefeed("empty sink-uri".into()));
        }
        if self.start_ts == 0 {
            return Err(ModelError::InvalidChangefeed("start-ts must be >= 1".into()));
        }
        let config = self.config.get_or_insert_with(ReplicaConfig::default);
        if config.filter.rules.is_empty() {
            config.filter.rules = vec!["*.*".to_string()];
        }
        Ok(())
    }
}

/// Advancing progress record of a changefeed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeFeedStatus {
    /// Highest timestamp the whole feed has resolved up to.
    #[serde(rename = "resolved-ts")]
    pub resolved_ts: Ts,

    /// Highest timestamp durably forwarded to the backend sink.
    #[serde(rename = "checkpoint-ts")]
    pub checkpoint_ts: Ts,
}
