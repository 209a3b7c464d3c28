use async_trait::async_trait;

use rill_model::{DdlEvent, RowChangedEvent, SimpleTableInfo, Ts};

use crate::SinkError;

/// A downstream writer of row events, DDL events, and checkpoints.
///
/// Implementations are shared behind `Arc` and called concurrently;
/// interior state is theirs to guard. Row batches arrive in commit-ts
/// order per table; `flush_row_changed_events(resolved_ts)` asks the
/// sink to make everything at or below `resolved_ts` durable and
/// returns the checkpoint it actually reached (which may trail the
/// request).
#[async_trait]
pub trait Sink: Send + Sync {
    /// Declares the replicated tables before any event flows.
    async fn initialize(&self, tables: &[SimpleTableInfo]) -> Result<(), SinkError>;

    /// Appends row events to the sink's unflushed window.
    async fn emit_row_changed_events(&self, rows: &[RowChangedEvent]) -> Result<(), SinkError>;

    /// Applies one schema change.
    ///
    /// # Errors
    ///
    /// [`SinkError::DdlIgnored`] means the sink skipped it on purpose
    /// and the caller must account it as executed.
    async fn emit_ddl_event(&self, ddl: &DdlEvent) -> Result<(), SinkError>;

    /// Records that the feed's checkpoint reached `ts`.
    async fn emit_checkpoint_ts(&self, ts: Ts) -> Result<(), SinkError>;

    /// Makes rows at or below `resolved_ts` durable; returns the
    /// checkpoint actually reached.
    async fn flush_row_changed_events(&self, resolved_ts: Ts) -> Result<Ts, SinkError>;

    /// Releases the sink.
    async fn close(&self) -> Result<(), SinkError>;
}
