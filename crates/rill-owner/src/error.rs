use thiserror::Error;
use tokio::sync::mpsc;

use rill_coord::{ChangefeedReactorState, CoordError};
use rill_model::{ChangefeedId, FeedState, RunningError};
use rill_sink::SinkError;
use rill_source::SourceError;

/// Any failure surfaced by the owner loop's collaborators.
#[derive(Debug, Error)]
pub enum OwnerError {
    /// Backend sink failure.
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// Source feed failure.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Coordination-store failure.
    #[error(transparent)]
    Coord(#[from] CoordError),
}

impl OwnerError {
    /// Stable machine-readable code for status records.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            OwnerError::Sink(_) => "owner:sink",
            OwnerError::Source(_) => "owner:source",
            OwnerError::Coord(_) => "owner:coord",
        }
    }
}

/// The error-handler capability injected at owner-loop startup.
///
/// Background workers cannot return errors to the tick that spawned
/// them; they report here instead. The receiving end of the channel is
/// drained by the owner tick, which pauses the changefeed on fatal
/// errors (see [`pause_changefeed`]).
#[derive(Debug, Clone)]
pub struct ErrorReporter {
    changefeed_id: ChangefeedId,
    tx: mpsc::UnboundedSender<OwnerError>,
}

impl ErrorReporter {
    /// Creates a reporter and the receiver the owner tick drains.
    #[must_use]
    pub fn channel(
        changefeed_id: ChangefeedId,
    ) -> (Self, mpsc::UnboundedReceiver<OwnerError>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { changefeed_id, tx }, rx)
    }

    /// The changefeed this reporter serves.
    #[must_use]
    pub fn changefeed_id(&self) -> &ChangefeedId {
        &self.changefeed_id
    }

    /// Logs and forwards an error to the owner tick.
    ///
    /// Delivery is best-effort: if the owner already went away there
    /// is nobody left to pause the feed, and the report is dropped.
    pub fn report(&self, err: impl Into<OwnerError>) {
        let err = err.into();
        tracing::error!(changefeed = %self.changefeed_id, error = %err, "owner worker error");
        let _ = self.tx.send(err);
    }
}

/// Pauses a changefeed on a fatal error: patches its info record to
/// [`FeedState::Failed`] with the error preserved.
///
/// The patch is enqueued on the reactor state; the commit layer makes
/// it durable on the next tick.
pub fn pause_changefeed(state: &mut ChangefeedReactorState, addr: &str, err: &OwnerError) {
    let running_error = RunningError {
        addr: addr.to_string(),
        code: err.code().to_string(),
        message: err.to_string(),
    };
    state.patch_info(move |info| {
        let Some(mut info) = info else {
            // The feed was removed while the error was in flight.
            return Ok((None, false));
        };
        info.state = FeedState::Failed;
        info.error = Some(running_error.clone());
        Ok((Some(info), true))
    });
}
