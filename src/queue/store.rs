// Queue store

use std::sync::Arc;

use tokio::sync::{mpsc::UnboundedSender, watch, Mutex};

use crate::{log::Logger, log_trace};

use super::{QueueSnapshot, QueueState, RemoveResult};

/// Thread-safe queue of stream keys.
///
/// A single mutex serializes every read and write. Composite steps run
/// inside [`QueueStore::transaction`], so they never take the lock twice.
/// Every effective mutation publishes the new lead to the lead watchers
/// and hands a snapshot to the writer task, which does the file I/O
/// after the lock has been released.
pub struct QueueStore {
    logger: Arc<Logger>,
    state: Mutex<QueueState>,
    snapshot_sender: Option<UnboundedSender<QueueSnapshot>>,
    lead_sender: watch::Sender<Option<String>>,
}

impl QueueStore {
    /// Creates new QueueStore
    ///
    /// # Arguments
    ///
    /// * `logger` - The logger
    /// * `state` - Initial state (empty, or restored from a snapshot)
    /// * `snapshot_sender` - Sender to the snapshot writer, if persistence is enabled
    pub fn new(
        logger: Arc<Logger>,
        state: QueueState,
        snapshot_sender: Option<UnboundedSender<QueueSnapshot>>,
    ) -> QueueStore {
        let (lead_sender, _) = watch::channel(state.peek().map(|k| k.to_string()));

        QueueStore {
            logger,
            state: Mutex::new(state),
            snapshot_sender,
            lead_sender,
        }
    }

    /// Subscribes to lead changes
    pub fn subscribe_lead(&self) -> watch::Receiver<Option<String>> {
        self.lead_sender.subscribe()
    }

    /// Runs a closure with exclusive access to the queue state
    ///
    /// # Return value
    ///
    /// Returns the value returned by the closure
    pub async fn transaction<R>(&self, f: impl FnOnce(&mut QueueState) -> R) -> R {
        let mut state = self.state.lock().await;

        let revision_before = state.revision();

        let result = f(&mut state);

        if state.revision() == revision_before {
            return result;
        }

        let snapshot = state.snapshot();

        let lead = state.peek().map(|k| k.to_string());
        self.lead_sender.send_if_modified(|current| {
            if *current != lead {
                *current = lead;
                true
            } else {
                false
            }
        });

        drop(state);

        log_trace!(
            self.logger,
            format!(
                "Revision {}: {:?} (last streamer: {:?})",
                snapshot.revision, snapshot.queue, snapshot.last_streamer
            )
        );

        if let Some(sender) = &self.snapshot_sender {
            _ = sender.send(snapshot);
        }

        result
    }

    /// Adds a key at the end of the queue, if absent
    pub async fn enqueue_if_absent(&self, key: &str) -> bool {
        self.transaction(|s| s.enqueue_if_absent(key)).await
    }

    /// Removes a key from any position of the queue
    pub async fn remove_if_present(&self, key: &str) -> RemoveResult {
        self.transaction(|s| s.remove_if_present(key)).await
    }

    /// Gets the current lead
    pub async fn peek(&self) -> Option<String> {
        self.state.lock().await.peek().map(|k| k.to_string())
    }

    /// Gets a copy of the queue, lead first
    pub async fn snapshot(&self) -> Vec<String> {
        self.state.lock().await.keys()
    }

    /// Gets a full copy of the state
    pub async fn full_snapshot(&self) -> QueueSnapshot {
        self.state.lock().await.snapshot()
    }

    /// Sets the last streamer
    pub async fn set_last_streamer(&self, key: Option<&str>) {
        self.transaction(|s| s.set_last_streamer(key)).await
    }

    /// Gets the last streamer
    pub async fn last_streamer(&self) -> Option<String> {
        self.state
            .lock()
            .await
            .last_streamer()
            .map(|k| k.to_string())
    }

    /// Enables or disables blocking
    pub async fn set_blocking(&self, enabled: bool) {
        self.transaction(|s| s.set_blocking(enabled)).await
    }

    /// True if blocking is active for a key
    pub async fn is_blocking_active(&self, key: &str) -> bool {
        self.state.lock().await.is_blocking_active(key)
    }
}
