// Media composer errors

use thiserror::Error;

/// Error returned by a media composer operation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ComposerError {
    /// The composer cannot be reached right now.
    /// Operations failing this way can be retried later.
    #[error("composer unavailable: {0}")]
    Unavailable(String),

    /// The composer did not answer in time
    #[error("composer request timed out: {0}")]
    Timeout(String),

    /// The composer refused the request
    #[error("request {request} failed with code {code}: {comment}")]
    Request {
        request: String,
        code: u16,
        comment: String,
    },

    /// Unexpected message from the composer
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The publisher could not be kicked
    #[error("could not kick publisher: {0}")]
    Kick(String),
}

impl ComposerError {
    /// True if the error is caused by a lost connection
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ComposerError::Unavailable(_))
    }
}
