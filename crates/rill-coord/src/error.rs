use thiserror::Error;

/// Errors from the coordination layer.
#[derive(Debug, Error)]
pub enum CoordError {
    /// A store value could not be decoded into its typed form.
    #[error("decode failed: {0}")]
    Decode(#[from] rill_model::ModelError),

    /// A key is not in the rill keyspace at all.
    #[error("invalid meta key: {0}")]
    InvalidKey(String),

    /// A key carries the rill prefix but an unrecognised tag.
    ///
    /// Reactor updates log and skip these rather than failing.
    #[error("unknown meta key: {0}")]
    UnknownKey(String),

    /// A capture's leased key vanished before a patch committed.
    ///
    /// Synthesised by the capture-alive probe; means the capture
    /// missed its heartbeat.
    #[error("capture lease expired: {0}")]
    LeaseExpired(String),

    /// A patch function rejected the current store value.
    #[error("patch failed: {0}")]
    Patch(String),
}

impl From<serde_json::Error> for CoordError {
    fn from(e: serde_json::Error) -> Self {
        CoordError::Decode(rill_model::ModelError::Decode(e))
    }
}
