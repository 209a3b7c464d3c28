use thiserror::Error;

/// Errors from the source feed path.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The upstream event feed failed.
    #[error("event feed error: {0}")]
    Feed(String),

    /// A raw entry could not be decoded.
    #[error("decode failed: {0}")]
    Decode(#[from] rill_model::ModelError),

    /// The feed was cancelled.
    #[error("cancelled")]
    Cancelled,
}
