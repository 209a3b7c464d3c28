//! Table-sink multiplexing and flush-watermark accounting.
//!
//! One [`SinkManager`] fronts one backend sink for a whole changefeed.
//! Every replicated table gets a [`TableSink`] that buffers its rows;
//! flushing a table forwards its resolved prefix to the backend and
//! then advances the shared checkpoint to the *minimum* emitted-ts
//! across all live tables, so the backend is never asked to flush
//! past a table that has not caught up.
//!
//! Locking: the registry mutex covers only add/remove and the
//! watermark scan; backend flushes serialise on their own async lock;
//! per-table buffers are unlocked single-writer state owned by the
//! table's worker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fxhash::FxHashMap;
use parking_lot::Mutex;

use rill_model::{RowChangedEvent, TableId, Ts};

use crate::{Sink, SinkError};

struct ManagerInner {
    backend: Arc<dyn Sink>,
    checkpoint_ts: AtomicU64,
    table_sinks: Mutex<FxHashMap<TableId, Arc<AtomicU64>>>,
    flush_lock: tokio::sync::Mutex<()>,
}

/// Multiplexes per-table sinks onto one backend sink.
#[derive(Clone)]
pub struct SinkManager {
    inner: Arc<ManagerInner>,
}

impl SinkManager {
    /// Creates a manager over `backend` starting from `checkpoint_ts`.
    #[must_use]
    pub fn new(backend: Arc<dyn Sink>, checkpoint_ts: Ts) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                backend,
                checkpoint_ts: AtomicU64::new(checkpoint_ts),
                table_sinks: Mutex::new(FxHashMap::default()),
                flush_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Creates the sink for `table_id`, initialised so the table
    /// counts as caught up to `start_checkpoint_ts`.
    ///
    /// # Panics
    ///
    /// Panics if the table already has a sink; creating two writers
    /// for one table is a programming error.
    #[must_use]
    pub fn create_table_sink(&self, table_id: TableId, start_checkpoint_ts: Ts) -> TableSink {
        let emitted_ts = Arc::new(AtomicU64::new(start_checkpoint_ts));
        let mut registry = self.inner.table_sinks.lock();
        if registry.contains_key(&table_id) {
            tracing::error!(table = table_id, "table sink already exists");
            panic!("table sink already exists: {table_id}");
        }
        registry.insert(table_id, Arc::clone(&emitted_ts));
        drop(registry);
        TableSink {
            table_id,
            manager: Arc::clone(&self.inner),
            buffer: Vec::with_capacity(128),
            emitted_ts,
        }
    }

    /// The checkpoint the backend has confirmed.
    #[must_use]
    pub fn checkpoint_ts(&self) -> Ts {
        self.inner.checkpoint_ts.load(Ordering::Acquire)
    }

    /// Flushes the backend at the conservative watermark and returns
    /// the new checkpoint.
    ///
    /// # Errors
    ///
    /// On backend failure the stored checkpoint is left untouched
    /// (readable via [`checkpoint_ts`](Self::checkpoint_ts)) and the
    /// error propagates.
    pub async fn flush_backend_sink(&self) -> Result<Ts, SinkError> {
        let _serialised = self.inner.flush_lock.lock().await;
        let min_emitted_ts = self.min_emitted_ts();
        let checkpoint_ts = self
            .inner
            .backend
            .flush_row_changed_events(min_emitted_ts)
            .await?;
        self.inner
            .checkpoint_ts
            .store(checkpoint_ts, Ordering::Release);
        Ok(checkpoint_ts)
    }

    /// Closes the backend sink.
    ///
    /// # Errors
    ///
    /// Propagates the backend's close failure.
    pub async fn close(&self) -> Result<(), SinkError> {
        self.inner.backend.close().await
    }

    fn min_emitted_ts(&self) -> Ts {
        let registry = self.inner.table_sinks.lock();
        if registry.is_empty() {
            return self.checkpoint_ts();
        }
        registry
            .values()
            .map(|emitted| emitted.load(Ordering::Acquire))
            .min()
            .expect("registry checked non-empty")
    }

    fn destroy_table_sink(&self, table_id: TableId) {
        self.inner.table_sinks.lock().remove(&table_id);
    }
}

impl std::fmt::Debug for SinkManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkManager")
            .field("checkpoint_ts", &self.checkpoint_ts())
            .field("tables", &self.inner.table_sinks.lock().len())
            .finish()
    }
}

/// Buffering sink for one table.
///
/// Single-writer: exactly one worker owns a `TableSink` and drives its
/// buffer; only the emitted-ts atomic is shared with the manager.
pub struct TableSink {
    table_id: TableId,
    manager: Arc<ManagerInner>,
    buffer: Vec<RowChangedEvent>,
    emitted_ts: Arc<AtomicU64>,
}

impl TableSink {
    /// The table this sink serves.
    #[must_use]
    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    /// Appends row events, which must arrive in commit-ts order.
    pub fn emit_row_changed_events(&mut self, rows: impl IntoIterator<Item = RowChangedEvent>) {
        self.buffer.extend(rows);
    }

    /// Forwards every buffered row with `commit_ts <= resolved_ts` to
    /// the backend, marks this table emitted up to `resolved_ts`, and
    /// triggers the manager-wide flush.
    ///
    /// # Errors
    ///
    /// Propagates backend failures; the manager checkpoint is
    /// unchanged in that case.
    pub async fn flush_row_changed_events(&mut self, resolved_ts: Ts) -> Result<Ts, SinkError> {
        let split = self
            .buffer
            .partition_point(|row| row.commit_ts <= resolved_ts);
        if split > 0 {
            let resolved_rows: Vec<RowChangedEvent> = self.buffer.drain(..split).collect();
            self.manager
                .backend
                .emit_row_changed_events(&resolved_rows)
                .await?;
        }
        self.emitted_ts.store(resolved_ts, Ordering::Release);
        SinkManager {
            inner: Arc::clone(&self.manager),
        }
        .flush_backend_sink()
        .await
    }

    /// Removes this table's sink from the manager.
    pub fn close(self) {
        SinkManager {
            inner: Arc::clone(&self.manager),
        }
        .destroy_table_sink(self.table_id);
    }
}

impl std::fmt::Debug for TableSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableSink")
            .field("table_id", &self.table_id)
            .field("buffered", &self.buffer.len())
            .field("emitted_ts", &self.emitted_ts.load(Ordering::Acquire))
            .finish()
    }
}

impl Drop for TableSink {
    fn drop(&mut self) {
        // Close-by-drop keeps the registry honest if a worker dies
        // without calling close(); double-remove is harmless.
        self.manager.table_sinks.lock().remove(&self.table_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rill_model::TableName;

    #[derive(Default)]
    struct RecordingSink {
        rows: Mutex<Vec<RowChangedEvent>>,
        flushes: Mutex<Vec<Ts>>,
        fail_flush: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl Sink for RecordingSink {
        async fn initialize(
            &self,
            _tables: &[rill_model::SimpleTableInfo],
        ) -> Result<(), SinkError> {
            Ok(())
        }

        async fn emit_row_changed_events(
            &self,
            rows: &[RowChangedEvent],
        ) -> Result<(), SinkError> {
            self.rows.lock().extend_from_slice(rows);
            Ok(())
        }

        async fn emit_ddl_event(&self, _ddl: &rill_model::DdlEvent) -> Result<(), SinkError> {
            Ok(())
        }

        async fn emit_checkpoint_ts(&self, _ts: Ts) -> Result<(), SinkError> {
            Ok(())
        }

        async fn flush_row_changed_events(&self, resolved_ts: Ts) -> Result<Ts, SinkError> {
            if self.fail_flush.load(Ordering::Relaxed) {
                return Err(SinkError::Backend("flush refused".into()));
            }
            self.flushes.lock().push(resolved_ts);
            Ok(resolved_ts)
        }

        async fn close(&self) -> Result<(), SinkError> {
            Ok(())
        }
    }

    fn row(table_id: TableId, commit_ts: Ts) -> RowChangedEvent {
        RowChangedEvent::new(
            TableName {
                schema: "s".into(),
                table: format!("t{table_id}"),
                table_id,
            },
            commit_ts.saturating_sub(1),
            commit_ts,
        )
    }

    #[tokio::test]
    async fn watermark_is_min_across_tables() {
        let backend = Arc::new(RecordingSink::default());
        let manager = SinkManager::new(Arc::clone(&backend) as Arc<dyn Sink>, 5);
        let mut a = manager.create_table_sink(1, 5);
        let mut b = manager.create_table_sink(2, 5);

        a.emit_row_changed_events([row(1, 6), row(1, 7), row(1, 8)]);
        b.emit_row_changed_events([row(2, 6), row(2, 9)]);

        // Table A flushes to 7: backend gets A@{6,7}; watermark min(7, 5) = 5.
        let checkpoint = a.flush_row_changed_events(7).await.unwrap();
        assert_eq!(checkpoint, 5);
        {
            let rows = backend.rows.lock();
            let commits: Vec<Ts> = rows.iter().map(|r| r.commit_ts).collect();
            assert_eq!(commits, vec![6, 7]);
        }
        assert_eq!(backend.flushes.lock().as_slice(), &[5]);

        // Table B flushes to 9: watermark min(7, 9) = 7.
        let checkpoint = b.flush_row_changed_events(9).await.unwrap();
        assert_eq!(checkpoint, 7);
        assert_eq!(manager.checkpoint_ts(), 7);
        assert_eq!(backend.flushes.lock().as_slice(), &[5, 7]);
    }

    #[tokio::test]
    async fn empty_flush_still_advances_emitted_ts() {
        let backend = Arc::new(RecordingSink::default());
        let manager = SinkManager::new(Arc::clone(&backend) as Arc<dyn Sink>, 3);
        let mut sink = manager.create_table_sink(1, 3);
        let checkpoint = sink.flush_row_changed_events(10).await.unwrap();
        assert_eq!(checkpoint, 10);
        assert!(backend.rows.lock().is_empty());
    }

    #[tokio::test]
    async fn unresolved_suffix_stays_buffered() {
        let backend = Arc::new(RecordingSink::default());
        let manager = SinkManager::new(Arc::clone(&backend) as Arc<dyn Sink>, 0);
        let mut sink = manager.create_table_sink(1, 0);
        sink.emit_row_changed_events([row(1, 2), row(1, 5), row(1, 9)]);
        sink.flush_row_changed_events(5).await.unwrap();
        {
            let rows = backend.rows.lock();
            assert_eq!(rows.len(), 2);
        }
        sink.flush_row_changed_events(9).await.unwrap();
        let rows = backend.rows.lock();
        assert_eq!(rows.last().unwrap().commit_ts, 9);
    }

    #[tokio::test]
    async fn backend_error_keeps_old_checkpoint() {
        let backend = Arc::new(RecordingSink::default());
        let manager = SinkManager::new(Arc::clone(&backend) as Arc<dyn Sink>, 4);
        let mut sink = manager.create_table_sink(1, 4);
        backend.fail_flush.store(true, Ordering::Relaxed);
        let err = sink.flush_row_changed_events(8).await;
        assert!(err.is_err());
        assert_eq!(manager.checkpoint_ts(), 4);
    }

    #[tokio::test]
    async fn empty_registry_flushes_at_checkpoint() {
        let backend = Arc::new(RecordingSink::default());
        let manager = SinkManager::new(Arc::clone(&backend) as Arc<dyn Sink>, 11);
        let checkpoint = manager.flush_backend_sink().await.unwrap();
        assert_eq!(checkpoint, 11);
        assert_eq!(backend.flushes.lock().as_slice(), &[11]);
    }

    #[tokio::test]
    async fn close_removes_table_from_watermark() {
        let backend = Arc::new(RecordingSink::default());
        let manager = SinkManager::new(Arc::clone(&backend) as Arc<dyn Sink>, 5);
        let mut a = manager.create_table_sink(1, 5);
        let b = manager.create_table_sink(2, 2);
        a.flush_row_changed_events(9).await.unwrap();
        assert_eq!(manager.checkpoint_ts(), 2);
        b.close();
        a.flush_row_changed_events(9).await.unwrap();
        assert_eq!(manager.checkpoint_ts(), 9);
    }

    #[test]
    #[should_panic(expected = "table sink already exists")]
    fn duplicate_table_sink_panics() {
        let backend = Arc::new(RecordingSink::default());
        let manager = SinkManager::new(backend as Arc<dyn Sink>, 0);
        let _first = manager.create_table_sink(1, 0);
        let _second = manager.create_table_sink(1, 0);
    }
}
