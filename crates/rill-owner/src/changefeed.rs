//! The changefeed controller.
//!
//! A pure state machine over timestamps, the table set, and the
//! barrier queue. Methods run on the single-threaded owner tick and
//! never suspend; concurrency lives outside.
//!
//! Every check in here guards an invariant the surrounding pipeline
//! is supposed to uphold. A failed check means an upstream bug, and
//! the controller aborts rather than replicate past it.

use std::collections::VecDeque;

use fxhash::FxHashMap;

use rill_model::{TableId, Ts};

use crate::scheduler::Scheduler;

/// Replication state of one table within a changefeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableTask {
    /// The table.
    pub table_id: TableId,
    /// Highest timestamp durably forwarded for this table.
    pub checkpoint_ts: Ts,
    /// Highest timestamp resolved for this table; written by the
    /// scheduler's progress reports.
    pub resolved_ts: Ts,
}

/// What a barrier synchronises on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierKind {
    /// A schema change that must run before rows at or past its ts.
    Ddl,
}

/// A timestamp the feed may not replicate past until cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Barrier {
    /// What the barrier synchronises on.
    pub kind: BarrierKind,
    /// No event with `commit_ts >= ts` ships before this clears.
    pub ts: Ts,
}

/// Table-set consequence of a finished DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlAction {
    /// Start replicating a table.
    AddTable(TableId),
    /// Stop replicating a table.
    DropTable(TableId),
}

/// Outcome the owner reports after executing a barrier's DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DdlResult {
    /// Commit timestamp the DDL finished at on the source.
    pub finish_ts: Ts,
    /// Table-set consequence.
    pub action: DdlAction,
}

/// Control logic of one changefeed: table set, barrier queue, and the
/// resolved-timestamp function.
pub struct Changefeed {
    table_tasks: FxHashMap<TableId, TableTask>,
    checkpoint_ts: Ts,
    ddl_resolved_ts: Ts,
    barriers: VecDeque<Barrier>,
    scheduler: Box<dyn Scheduler>,
}

impl Changefeed {
    /// Creates a controller starting at `checkpoint_ts` with an empty
    /// table set.
    #[must_use]
    pub fn new(checkpoint_ts: Ts, scheduler: Box<dyn Scheduler>) -> Self {
        Self {
            table_tasks: FxHashMap::default(),
            checkpoint_ts,
            ddl_resolved_ts: 0,
            barriers: VecDeque::new(),
            scheduler,
        }
    }

    /// The feed's checkpoint.
    #[must_use]
    pub fn checkpoint_ts(&self) -> Ts {
        self.checkpoint_ts
    }

    /// Advances the checkpoint. Must not regress.
    pub fn set_checkpoint_ts(&mut self, ts: Ts) {
        debug_assert!(ts >= self.checkpoint_ts, "checkpoint regressed");
        self.checkpoint_ts = ts;
    }

    /// The current table set.
    #[must_use]
    pub fn table_tasks(&self) -> &FxHashMap<TableId, TableTask> {
        &self.table_tasks
    }

    /// Records a table's resolved progress, as reported by its worker.
    pub fn set_table_resolved_ts(&mut self, table_id: TableId, resolved_ts: Ts) {
        if let Some(task) = self.table_tasks.get_mut(&table_id) {
            task.resolved_ts = resolved_ts;
        }
    }

    /// Tracks the DDL stream's resolved timestamp as an upper bound
    /// for row emission.
    pub fn set_ddl_resolved_ts(&mut self, ts: Ts) {
        debug_assert!(ts >= self.ddl_resolved_ts, "ddl resolved ts regressed");
        self.ddl_resolved_ts = ts;
    }

    /// The tracked DDL resolved timestamp.
    #[must_use]
    pub fn ddl_resolved_ts(&self) -> Ts {
        self.ddl_resolved_ts
    }

    /// Queues a DDL barrier at `ts`.
    ///
    /// # Panics
    ///
    /// The puller feeding this guarantees monotonicity, so a barrier
    /// at or below the last queued one, or below the DDL resolved
    /// timestamp, is a programming error.
    pub fn add_ddl_barrier(&mut self, ts: Ts) {
        if let Some(last) = self.barriers.back() {
            if ts <= last.ts {
                tracing::error!(
                    last_barrier_ts = last.ts,
                    new_barrier_ts = ts,
                    "ddl barrier out of order"
                );
                panic!("ddl barrier out of order: {ts} after {}", last.ts);
            }
        }
        if ts < self.ddl_resolved_ts {
            tracing::error!(
                ddl_resolved_ts = self.ddl_resolved_ts,
                new_barrier_ts = ts,
                "ddl barrier below resolved ts"
            );
            panic!(
                "ddl barrier below resolved ts: {ts} < {}",
                self.ddl_resolved_ts
            );
        }
        self.barriers.push_back(Barrier {
            kind: BarrierKind::Ddl,
            ts,
        });
    }

    /// Returns the head barrier when the checkpoint sits immediately
    /// below it, meaning its DDL must run now.
    ///
    /// # Panics
    ///
    /// Panics if the checkpoint has run past an uncleared barrier.
    #[must_use]
    pub fn should_run_ddl(&self) -> Option<Barrier> {
        let head = self.barriers.front()?;
        if head.ts == self.checkpoint_ts + 1 && head.kind == BarrierKind::Ddl {
            return Some(*head);
        }
        if head.ts <= self.checkpoint_ts {
            tracing::error!(
                checkpoint_ts = self.checkpoint_ts,
                barrier_ts = head.ts,
                "checkpoint ran past an uncleared barrier"
            );
            panic!(
                "checkpoint {} ran past barrier {}",
                self.checkpoint_ts, head.ts
            );
        }
        None
    }

    /// Clears the head barrier after its DDL executed and applies the
    /// table-set consequence, then re-plans scheduling.
    ///
    /// # Panics
    ///
    /// Panics when the checkpoint is not exactly `finish_ts - 1`, when
    /// the head barrier does not match the result, or when a drop
    /// names an unknown table.
    pub fn mark_ddl_done(&mut self, result: DdlResult) {
        assert!(
            self.checkpoint_ts == result.finish_ts - 1,
            "unexpected checkpoint {} for ddl finishing at {}",
            self.checkpoint_ts,
            result.finish_ts,
        );
        let matches_head = self
            .barriers
            .front()
            .is_some_and(|head| head.kind == BarrierKind::Ddl && head.ts == result.finish_ts);
        assert!(
            matches_head,
            "no ddl barrier found at {}",
            result.finish_ts
        );
        self.barriers.pop_front();

        match result.action {
            DdlAction::AddTable(table_id) => {
                self.table_tasks.insert(
                    table_id,
                    TableTask {
                        table_id,
                        checkpoint_ts: self.checkpoint_ts,
                        resolved_ts: 0,
                    },
                );
            }
            DdlAction::DropTable(table_id) => {
                assert!(
                    self.table_tasks.remove(&table_id).is_some(),
                    "dropping unknown table {table_id}",
                );
            }
        }

        self.scheduler.sync_tasks(&self.table_tasks);
    }

    /// The feed's resolved timestamp: the minimum of every table's
    /// resolved-ts, the head barrier minus one, and the DDL resolved
    /// timestamp. `u64::MAX` when nothing bounds it.
    #[must_use]
    pub fn resolved_ts(&self) -> Ts {
        let mut resolved = Ts::MAX;
        for task in self.table_tasks.values() {
            resolved = resolved.min(task.resolved_ts);
        }
        if let Some(head) = self.barriers.front() {
            resolved = resolved.min(head.ts - 1);
        }
        resolved.min(self.ddl_resolved_ts)
    }
}

impl std::fmt::Debug for Changefeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Changefeed")
            .field("checkpoint_ts", &self.checkpoint_ts)
            .field("ddl_resolved_ts", &self.ddl_resolved_ts)
            .field("tables", &self.table_tasks.len())
            .field("barriers", &self.barriers)
            .finish_non_exhaustive()
    }
}
