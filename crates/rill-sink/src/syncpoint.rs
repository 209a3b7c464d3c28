//! Syncpoint stores.
//!
//! When a changefeed enables sync points, the owner records each
//! checkpoint it publishes into a per-changefeed downstream table so
//! external tooling can align upstream and downstream reads. The store
//! lives and dies with the async sink.

use async_trait::async_trait;
use parking_lot::Mutex;

use rill_model::{ChangefeedId, Ts};

use crate::SinkError;

/// Downstream store for (changefeed, checkpoint) alignment records.
#[async_trait]
pub trait SyncpointStore: Send + Sync {
    /// Creates the downstream table if it does not exist.
    async fn create_synctable(&self) -> Result<(), SinkError>;

    /// Records that `changefeed_id` published checkpoint `ts`.
    async fn sink_syncpoint(&self, changefeed_id: &ChangefeedId, ts: Ts) -> Result<(), SinkError>;

    /// Releases the store.
    async fn close(&self) -> Result<(), SinkError>;
}

/// A syncpoint store that keeps records in memory.
#[derive(Debug, Default)]
pub struct InMemorySyncpointStore {
    created: Mutex<bool>,
    records: Mutex<Vec<(ChangefeedId, Ts)>>,
}

impl InMemorySyncpointStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded syncpoints, in insertion order.
    #[must_use]
    pub fn records(&self) -> Vec<(ChangefeedId, Ts)> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl SyncpointStore for InMemorySyncpointStore {
    async fn create_synctable(&self) -> Result<(), SinkError> {
        *self.created.lock() = true;
        Ok(())
    }

    async fn sink_syncpoint(&self, changefeed_id: &ChangefeedId, ts: Ts) -> Result<(), SinkError> {
        if !*self.created.lock() {
            return Err(SinkError::Backend("synctable not created".into()));
        }
        self.records.lock().push((changefeed_id.clone(), ts));
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
