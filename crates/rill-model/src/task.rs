//! Per-capture task records.
//!
//! Each capture hosting part of a changefeed reports progress through
//! three store records keyed by (capture, changefeed): its position
//! (timestamps), its status (assigned tables and pending operations),
//! and its workload estimate.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::changefeed::RunningError;
use crate::{TableId, Ts};

/// A capture's progress within one changefeed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPosition {
    /// Highest timestamp this capture has durably forwarded.
    #[serde(rename = "checkpoint-ts")]
    pub checkpoint_ts: Ts,

    /// Highest timestamp this capture has resolved.
    #[serde(rename = "resolved-ts")]
    pub resolved_ts: Ts,

    /// Consecutive error count, for backoff accounting.
    #[serde(default)]
    pub count: u64,

    /// Last error this capture hit on the changefeed.
    #[serde(default)]
    pub error: Option<RunningError>,
}

/// Replication parameters of one table assigned to a capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReplicaInfo {
    /// Timestamp the table's replication starts from.
    #[serde(rename = "start-ts")]
    pub start_ts: Ts,
}

/// A pending add/remove operation on a table assignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOperation {
    /// True for a removal, false for an add.
    #[serde(default)]
    pub delete: bool,

    /// Ts boundary the operation takes effect at.
    #[serde(rename = "boundary-ts", default)]
    pub boundary_ts: Ts,
}

/// Tables assigned to a capture plus in-flight assignment changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    /// Assigned tables.
    #[serde(default)]
    pub tables: HashMap<TableId, TableReplicaInfo>,

    /// Operations not yet acknowledged by the capture.
    #[serde(default)]
    pub operations: HashMap<TableId, TableOperation>,
}

/// Per-table workload weight reported by a capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadInfo {
    /// Relative weight; the scheduler balances on the sum.
    pub workload: u64,
}

/// Workload report for all tables a capture hosts.
pub type TaskWorkload = HashMap<TableId, WorkloadInfo>;
