//! # Rill Model
//!
//! Shared model types for the rill replication control plane: the
//! identifiers, timestamps, changefeed metadata, and event shapes that
//! every other crate in the workspace speaks.
//!
//! All metadata structures that live in the coordination store
//! (`ChangeFeedInfo`, `ChangeFeedStatus`, task records) serialise to
//! canonical JSON via serde. Event types (`RowChangedEvent`,
//! `DdlEvent`) never touch the store; they flow from the source feed
//! to the backend sinks.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Changefeed metadata: info, status, and feed state.
pub mod changefeed;

/// Replica configuration and event filtering.
pub mod config;

/// Row and DDL event types.
pub mod event;

/// Capture (worker node) descriptors.
pub mod capture;

/// Per-capture task records: positions, statuses, workloads.
pub mod task;

mod error;

pub use capture::CaptureInfo;
pub use changefeed::{ChangeFeedInfo, ChangeFeedStatus, FeedState, RunningError};
pub use config::{DdlFilter, FilterConfig, ReplicaConfig};
pub use error::ModelError;
pub use event::{
    Column, DdlEvent, DdlJob, DdlJobType, RowChangedEvent, SimpleTableInfo, TableName,
};
pub use task::{TableOperation, TableReplicaInfo, TaskPosition, TaskStatus, TaskWorkload, WorkloadInfo};

/// A timestamp from the source cluster's hybrid logical clock.
///
/// Two roles appear throughout the control plane: a *commit-ts* is one
/// transaction's finish time; a *resolved-ts* asserts that no commit
/// with a timestamp at or below it will be observed later on that
/// stream.
pub type Ts = u64;

/// Identifier of a changefeed (administrator-chosen).
pub type ChangefeedId = String;

/// Identifier of a capture process.
pub type CaptureId = String;

/// Identifier of a source table.
pub type TableId = i64;
