// Dispatcher errors

use thiserror::Error;

use crate::composer::ComposerError;

/// Error executing a job
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The composer cannot be reached, the job can be retried
    #[error("composer unavailable: {0}")]
    Unavailable(String),

    /// A new source never reached the playing state
    #[error("source for {key} failed: {reason}")]
    SourceCreation { key: String, reason: String },

    /// Any other composer failure
    #[error(transparent)]
    Composer(#[from] ComposerError),
}

impl DispatchError {
    /// Maps a composer error raised while bringing up the source of a key
    pub fn source_creation(key: &str, err: ComposerError) -> DispatchError {
        match err {
            ComposerError::Unavailable(reason) => DispatchError::Unavailable(reason),
            e => DispatchError::SourceCreation {
                key: key.to_string(),
                reason: e.to_string(),
            },
        }
    }

    /// True if the job can be retried later
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::Unavailable(_))
            || matches!(self, DispatchError::Composer(e) if e.is_unavailable())
    }
}
