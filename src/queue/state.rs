// Queue state

use std::collections::VecDeque;

use super::QueueSnapshot;

/// Result of removing a key from the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveResult {
    /// True if the key was present
    pub removed: bool,

    /// True if the key was the head of the queue (the lead)
    pub was_lead: bool,
}

/// Ordered queue of unique stream keys, plus the blocking state.
///
/// The head of the queue is the lead: the only stream being forwarded
/// to the broadcast output. `last_streamer` remembers the most recently
/// evicted lead and never equals the current lead.
#[derive(Debug, Default, Clone)]
pub struct QueueState {
    keys: VecDeque<String>,
    last_streamer: Option<String>,
    blocking_enabled: bool,

    /// Incremented on every effective mutation
    revision: u64,
}

impl QueueState {
    /// Creates an empty state
    pub fn new(blocking_enabled: bool) -> QueueState {
        QueueState {
            blocking_enabled,
            ..QueueState::default()
        }
    }

    /// Rebuilds the state from a persisted snapshot.
    /// Duplicated keys in the snapshot are dropped.
    pub fn from_snapshot(snapshot: QueueSnapshot) -> QueueState {
        let mut state = QueueState {
            keys: VecDeque::with_capacity(snapshot.queue.len()),
            last_streamer: snapshot.last_streamer,
            blocking_enabled: snapshot.blocking_enabled,
            revision: snapshot.revision,
        };

        for key in snapshot.queue {
            if !state.keys.contains(&key) {
                state.keys.push_back(key);
            }
        }

        state.check_last_streamer();

        state
    }

    /// Current revision
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Adds a key at the end of the queue, if not already present
    ///
    /// Returns true if the key was added
    pub fn enqueue_if_absent(&mut self, key: &str) -> bool {
        if self.contains(key) {
            return false;
        }

        self.keys.push_back(key.to_string());
        self.check_last_streamer();
        self.revision += 1;

        true
    }

    /// Removes a key from any position in the queue
    pub fn remove_if_present(&mut self, key: &str) -> RemoveResult {
        let position = match self.keys.iter().position(|k| k == key) {
            Some(p) => p,
            None => {
                return RemoveResult {
                    removed: false,
                    was_lead: false,
                }
            }
        };

        self.keys.remove(position);
        self.check_last_streamer();
        self.revision += 1;

        RemoveResult {
            removed: true,
            was_lead: position == 0,
        }
    }

    /// Gets the current lead
    pub fn peek(&self) -> Option<&str> {
        self.keys.front().map(|k| k.as_str())
    }

    /// Checks if a key is queued
    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    /// Number of queued keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True if nobody is queued
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Copy of the queue, in wait order
    pub fn keys(&self) -> Vec<String> {
        self.keys.iter().cloned().collect()
    }

    /// Full copy of the state, for persistence
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            queue: self.keys(),
            last_streamer: self.last_streamer.clone(),
            blocking_enabled: self.blocking_enabled,
            revision: self.revision,
            saved_at: None,
        }
    }

    /// Sets (or clears) the last streamer
    pub fn set_last_streamer(&mut self, key: Option<&str>) {
        if self.last_streamer.as_deref() == key {
            return;
        }

        self.last_streamer = key.map(|k| k.to_string());
        self.check_last_streamer();
        self.revision += 1;
    }

    /// Gets the last streamer
    pub fn last_streamer(&self) -> Option<&str> {
        self.last_streamer.as_deref()
    }

    /// Enables or disables blocking
    pub fn set_blocking(&mut self, enabled: bool) {
        if self.blocking_enabled == enabled {
            return;
        }

        self.blocking_enabled = enabled;
        self.revision += 1;
    }

    /// True if blocking is enabled
    pub fn blocking_enabled(&self) -> bool {
        self.blocking_enabled
    }

    /// True if blocking is enabled and the key is the last streamer
    pub fn is_blocking_active(&self, key: &str) -> bool {
        self.blocking_enabled && self.last_streamer.as_deref() == Some(key)
    }

    // A streamer cannot be "just evicted" and "currently live" at once
    fn check_last_streamer(&mut self) {
        if self.last_streamer.is_some() && self.last_streamer.as_deref() == self.peek() {
            self.last_streamer = None;
        }
    }
}
