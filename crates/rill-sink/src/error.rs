use thiserror::Error;

/// Errors from backend sinks and the sink manager.
///
/// Three classes matter to callers: `DdlIgnored` is a sentinel the
/// async sink treats exactly like success, `DdlExecFailed` is fatal
/// and pauses the changefeed, and transport-level failures are
/// retryable upstream.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The backend chose to skip this DDL; treat as executed.
    #[error("ddl event ignored by the sink")]
    DdlIgnored,

    /// The backend attempted the DDL and it failed.
    #[error("ddl execution failed: {0}")]
    DdlExecFailed(String),

    /// A transport or downstream write failure.
    #[error("backend sink error: {0}")]
    Backend(String),

    /// An I/O failure beneath the backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The sink was already closed.
    #[error("sink closed")]
    Closed,

    /// The operation was cancelled by shutdown.
    #[error("cancelled")]
    Cancelled,
}

impl SinkError {
    /// Whether this is the ignored-DDL sentinel.
    #[must_use]
    pub fn is_ddl_ignored(&self) -> bool {
        matches!(self, SinkError::DdlIgnored)
    }

    /// Whether the caller may retry the operation.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, SinkError::Backend(_) | SinkError::Io(_))
    }
}
