// Media composer interface

use async_trait::async_trait;

use super::{ComposerError, InputStatus};

/// Operations issued against the media composer rendering the broadcast output
#[async_trait]
pub trait MediaComposer: Send + Sync {
    /// Creates an input named `name` reading from `url`.
    /// The input starts hidden.
    async fn create_input(&self, name: &str, url: &str) -> Result<(), ComposerError>;

    /// Shows or hides an input
    async fn set_visible(&self, name: &str, visible: bool) -> Result<(), ComposerError>;

    /// Removes an input
    async fn remove_input(&self, name: &str) -> Result<(), ComposerError>;

    /// Gets the playback state of an input
    async fn get_input_status(&self, name: &str) -> Result<InputStatus, ComposerError>;

    /// Disconnects the publisher of a stream key from the ingest server
    async fn kick_publisher(&self, key: &str) -> Result<(), ComposerError>;
}
