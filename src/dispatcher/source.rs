// Dynamic sources

use tokio::time::Instant;

/// Lifecycle of a dynamic source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Created,
    Buffering,
    Playing,
    Failed,
    Removed,
}

impl SourceState {
    /// Checks a lifecycle transition
    ///
    /// Created -> Buffering -> Playing | Failed -> Removed
    pub fn can_transition_to(&self, next: SourceState) -> bool {
        matches!(
            (self, next),
            (SourceState::Created, SourceState::Buffering)
                | (SourceState::Created, SourceState::Failed)
                | (SourceState::Buffering, SourceState::Playing)
                | (SourceState::Buffering, SourceState::Failed)
                | (SourceState::Playing, SourceState::Failed)
                | (SourceState::Created, SourceState::Removed)
                | (SourceState::Buffering, SourceState::Removed)
                | (SourceState::Playing, SourceState::Removed)
                | (SourceState::Failed, SourceState::Removed)
        )
    }
}

/// Output binding created for one stream key
#[derive(Debug, Clone)]
pub struct DynamicSource {
    /// Unique input name in the composer
    pub name: String,

    /// Stream key
    pub key: String,

    /// Relay URL the input reads from
    pub url: String,

    /// Current state
    pub state: SourceState,

    /// Creation time
    pub created_at: Instant,
}

impl DynamicSource {
    /// Creates new DynamicSource, in the Created state
    pub fn new(name: String, key: &str, url: String) -> DynamicSource {
        DynamicSource {
            name,
            key: key.to_string(),
            url,
            state: SourceState::Created,
            created_at: Instant::now(),
        }
    }

    /// Moves to another state
    ///
    /// Returns false, leaving the state untouched, if the transition is invalid
    pub fn set_state(&mut self, next: SourceState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }

        self.state = next;
        true
    }
}
