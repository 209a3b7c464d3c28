//! Table-task scheduling contract.

use std::sync::Arc;

use fxhash::FxHashMap;
use parking_lot::Mutex;

use rill_model::TableId;

use crate::changefeed::TableTask;

/// Reconciles the controller's table set with worker assignments.
///
/// `sync_tasks` is an idempotent, full-state handoff: the controller
/// passes its complete table set after every mutation and the
/// implementation diffs it against what workers currently run, issuing
/// add and remove commands as needed. The controller never calls it
/// concurrently with itself.
pub trait Scheduler: Send {
    /// Re-plans worker assignments to match `tasks`.
    fn sync_tasks(&mut self, tasks: &FxHashMap<TableId, TableTask>);
}

/// A scheduler that records every handoff; for wiring and tests.
///
/// The recorder's log is shared, so callers can keep a handle while
/// the controller owns the scheduler.
#[derive(Debug, Default, Clone)]
pub struct RecordingScheduler {
    synced: Arc<Mutex<Vec<Vec<TableId>>>>,
}

impl RecordingScheduler {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table sets received so far, one entry per `sync_tasks` call,
    /// each sorted by table id.
    #[must_use]
    pub fn synced(&self) -> Vec<Vec<TableId>> {
        self.synced.lock().clone()
    }
}

impl Scheduler for RecordingScheduler {
    fn sync_tasks(&mut self, tasks: &FxHashMap<TableId, TableTask>) {
        let mut ids: Vec<TableId> = tasks.keys().copied().collect();
        ids.sort_unstable();
        self.synced.lock().push(ids);
    }
}
