//! The counting no-op backend.
//!
//! Accepts everything, durably stores nothing, and reports whatever it
//! was asked to flush as its checkpoint. Useful for wiring a changefeed
//! end to end without a downstream system, and as the default backend
//! in tests.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use rill_model::{DdlEvent, RowChangedEvent, SimpleTableInfo, Ts};

use crate::{Sink, SinkError};

/// A backend sink that discards events and counts them.
#[derive(Debug, Default)]
pub struct BlackholeSink {
    accepted_rows: AtomicU64,
    accepted_ddls: AtomicU64,
    checkpoint_ts: AtomicU64,
}

impl BlackholeSink {
    /// Creates an empty blackhole.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows accepted so far.
    #[must_use]
    pub fn accepted_rows(&self) -> u64 {
        self.accepted_rows.load(Ordering::Relaxed)
    }

    /// DDL events accepted so far.
    #[must_use]
    pub fn accepted_ddls(&self) -> u64 {
        self.accepted_ddls.load(Ordering::Relaxed)
    }

    /// The last checkpoint observed.
    #[must_use]
    pub fn checkpoint_ts(&self) -> Ts {
        self.checkpoint_ts.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Sink for BlackholeSink {
    async fn initialize(&self, _tables: &[SimpleTableInfo]) -> Result<(), SinkError> {
        Ok(())
    }

    async fn emit_row_changed_events(&self, rows: &[RowChangedEvent]) -> Result<(), SinkError> {
        self.accepted_rows
            .fetch_add(rows.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    async fn emit_ddl_event(&self, ddl: &DdlEvent) -> Result<(), SinkError> {
        tracing::info!(commit_ts = ddl.commit_ts, query = %ddl.query, "blackhole swallowed ddl");
        self.accepted_ddls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn emit_checkpoint_ts(&self, ts: Ts) -> Result<(), SinkError> {
        self.checkpoint_ts.store(ts, Ordering::Release);
        Ok(())
    }

    async fn flush_row_changed_events(&self, resolved_ts: Ts) -> Result<Ts, SinkError> {
        Ok(resolved_ts)
    }

    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_model::TableName;

    #[tokio::test]
    async fn counts_and_echoes() {
        let sink = BlackholeSink::new();
        let rows = vec![RowChangedEvent::new(TableName::default(), 1, 2)];
        sink.emit_row_changed_events(&rows).await.unwrap();
        assert_eq!(sink.accepted_rows(), 1);
        assert_eq!(sink.flush_row_changed_events(9).await.unwrap(), 9);
        sink.emit_checkpoint_ts(9).await.unwrap();
        assert_eq!(sink.checkpoint_ts(), 9);
    }
}
