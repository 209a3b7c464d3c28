//! Scripted feeds for tests.
//!
//! `MockEventFeed` replays a fixed script of events and then either
//! fails with a configured error or idles until the consumer goes
//! away, matching the long-running contract of a real feed.

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use rill_model::Ts;

use crate::feed::{EventFeed, RegionFeedEvent};
use crate::span::Span;
use crate::SourceError;

/// An `EventFeed` that replays a script.
#[derive(Debug, Default)]
pub struct MockEventFeed {
    script: Vec<RegionFeedEvent>,
    fail_after: Mutex<Option<String>>,
}

impl MockEventFeed {
    /// Creates a feed replaying `script` then idling.
    #[must_use]
    pub fn new(script: Vec<RegionFeedEvent>) -> Self {
        Self {
            script,
            fail_after: Mutex::new(None),
        }
    }

    /// Makes the feed fail with `message` once the script is drained.
    #[must_use]
    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        *self.fail_after.get_mut() = Some(message.into());
        self
    }
}

#[async_trait]
impl EventFeed for MockEventFeed {
    async fn run(
        &self,
        _span: Span,
        _start_ts: Ts,
        output: mpsc::Sender<RegionFeedEvent>,
    ) -> Result<(), SourceError> {
        for event in self.script.clone() {
            if output.send(event).await.is_err() {
                return Ok(());
            }
        }
        if let Some(message) = self.fail_after.lock().take() {
            return Err(SourceError::Feed(message));
        }
        // A real feed never returns on its own; park until the
        // consumer drops the channel.
        output.closed().await;
        Ok(())
    }
}
