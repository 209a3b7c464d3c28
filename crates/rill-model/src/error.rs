use thiserror::Error;

/// Errors raised while decoding or validating model values.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A JSON value could not be parsed into the target type.
    #[error("decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    /// A decoded `ChangeFeedInfo` failed post-decode validation.
    #[error("invalid changefeed info: {0}")]
    InvalidChangefeed(String),

    /// A filter rule could not be compiled.
    #[error("invalid filter rule '{rule}': {reason}")]
    InvalidFilterRule {
        /// The offending rule text.
        rule: String,
        /// Why it was rejected.
        reason: String,
    },
}
