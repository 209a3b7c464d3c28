//! Raw feed events and the `EventFeed` trait.

use async_trait::async_trait;
use tokio::sync::mpsc;

use rill_model::Ts;

use crate::span::Span;
use crate::SourceError;

/// Kind of a raw feed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpType {
    /// A key was written.
    Put,
    /// A key was deleted.
    Delete,
    /// A resolved-ts assertion for the stream.
    Resolved,
}

/// One raw entry from the source feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawKvEntry {
    /// Entry kind.
    pub op_type: OpType,
    /// Source key; empty for resolved markers.
    pub key: Vec<u8>,
    /// Encoded value; empty for deletes and resolved markers.
    pub value: Vec<u8>,
    /// Transaction start timestamp; zero for resolved markers.
    pub start_ts: Ts,
    /// Commit timestamp, or the resolved timestamp for markers.
    pub crts: Ts,
}

impl RawKvEntry {
    /// A resolved-ts marker.
    #[must_use]
    pub fn resolved(ts: Ts) -> Self {
        Self {
            op_type: OpType::Resolved,
            key: Vec::new(),
            value: Vec::new(),
            start_ts: 0,
            crts: ts,
        }
    }

    /// Whether this entry is a resolved-ts marker.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.op_type == OpType::Resolved
    }
}

/// One event from a region of the source feed.
///
/// Regions deliver value entries interleaved with per-span resolved
/// assertions; the feed client multiplexes all regions of the watched
/// span onto one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionFeedEvent {
    /// A committed mutation.
    Entry(RawKvEntry),
    /// No commit at or below `ts` will be observed later on `span`.
    Resolved {
        /// The span the assertion covers.
        span: Span,
        /// The resolved timestamp.
        ts: Ts,
    },
}

/// Long-running feed of committed changes over one key span.
///
/// The implementation guarantees resolved-ts advancement but not
/// per-entry ordering across regions; consumers needing commit-ts
/// order put [`run_sorter`](crate::run_sorter) behind the channel.
///
/// `run` stays live until the feed fails or the receiver is dropped.
#[async_trait]
pub trait EventFeed: Send + Sync {
    /// Streams events for `span` starting at `start_ts` into `output`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Feed`] when the upstream stream breaks;
    /// the caller decides whether to restart.
    async fn run(
        &self,
        span: Span,
        start_ts: Ts,
        output: mpsc::Sender<RegionFeedEvent>,
    ) -> Result<(), SourceError>;
}
