//! Error types for timecell.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TimecellError>;

/// Errors raised by the store, the predicate compiler and the materializers.
#[derive(Debug, Error)]
pub enum TimecellError {
    /// The `when` expression could not be compiled.
    #[error("malformed predicate at offset {position}: {message}")]
    MalformedPredicate { position: usize, message: String },

    /// A lookup targeted a row id that was never recorded.
    #[error("unknown row '{0}'")]
    UnknownRow(String),

    /// A write was attempted on a dataset that has already been committed.
    #[error("dataset '{0}' is committed and can no longer be written")]
    DatasetCommitted(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TimecellError {
    pub(crate) fn malformed(position: usize, message: impl Into<String>) -> Self {
        TimecellError::MalformedPredicate {
            position,
            message: message.into(),
        }
    }

    /// True for errors caused by the `when` expression itself.
    pub fn is_malformed_predicate(&self) -> bool {
        matches!(self, TimecellError::MalformedPredicate { .. })
    }

    /// True when a lookup targeted a row that never existed.
    pub fn is_unknown_row(&self) -> bool {
        matches!(self, TimecellError::UnknownRow(_))
    }
}
