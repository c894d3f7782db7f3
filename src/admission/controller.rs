// Admission controller

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    composer::MediaComposer,
    dispatcher::{JobKind, JobSender, SwitchPermit},
    log::Logger,
    log_debug, log_error, log_info, log_warning,
    queue::{QueueSnapshot, QueueState, QueueStore},
};

use super::{EvictionReason, Promotion, PublishDecision};

/// Effect of an unpublish on the queue
enum Unpublished {
    NotQueued,
    LeftQueue,
    LeftSlot(Promotion),
}

/// Decides which publisher owns the broadcast slot.
///
/// Every decision runs inside a single queue transaction.
/// Side effects against the composer are enqueued as jobs,
/// so no decision ever waits for the composer.
pub struct AdmissionController {
    logger: Arc<Logger>,
    store: Arc<QueueStore>,
    jobs: JobSender,
    composer: Arc<dyn MediaComposer>,

    /// Held from the promotion of a new lead until its switch job finishes.
    /// Always taken while holding the queue lock.
    switch_in_flight: Arc<Mutex<()>>,
}

impl AdmissionController {
    /// Creates new AdmissionController
    ///
    /// # Arguments
    ///
    /// * `logger` - The logger
    /// * `store` - The queue
    /// * `jobs` - Sender to the job dispatcher
    /// * `composer` - The media composer, used to kick publishers
    pub fn new(
        logger: Arc<Logger>,
        store: Arc<QueueStore>,
        jobs: JobSender,
        composer: Arc<dyn MediaComposer>,
    ) -> AdmissionController {
        AdmissionController {
            logger,
            store,
            jobs,
            composer,
            switch_in_flight: Arc::new(Mutex::new(())),
        }
    }

    /// Gets the queue store
    pub fn store(&self) -> &Arc<QueueStore> {
        &self.store
    }

    /// Gets the job sender
    pub fn jobs(&self) -> &JobSender {
        &self.jobs
    }

    /// Handles a publish request
    ///
    /// # Arguments
    ///
    /// * `key` - Stream key of the publisher
    ///
    /// # Return value
    ///
    /// Returns the decision for the publisher
    pub async fn on_publish(&self, key: &str) -> PublishDecision {
        let decision = self
            .store
            .transaction(|state| {
                if state.peek() == Some(key) {
                    return PublishDecision::Forward;
                }

                if !state.is_empty() {
                    state.enqueue_if_absent(key);
                    return PublishDecision::EnqueueOnly;
                }

                if state.is_blocking_active(key) {
                    return PublishDecision::Reject;
                }

                state.set_last_streamer(None);
                state.enqueue_if_absent(key);

                if !self.jobs.enqueue(JobKind::StartDynamicSource, Some(key)) {
                    log_error!(
                        self.logger,
                        format!("Could not start the source for {}: dispatcher is gone", key)
                    );
                }

                PublishDecision::Forward
            })
            .await;

        match decision {
            PublishDecision::Forward => {
                log_info!(self.logger, format!("Publish {}: forward", key));
            }
            PublishDecision::EnqueueOnly => {
                log_info!(self.logger, format!("Publish {}: queued", key));
            }
            PublishDecision::Reject => {
                log_warning!(
                    self.logger,
                    format!("Publish {}: rejected (last streamer while blocking)", key)
                );
            }
        }

        decision
    }

    /// Handles the end of a publication
    ///
    /// # Arguments
    ///
    /// * `key` - Stream key of the publisher
    pub async fn on_unpublish(&self, key: &str) {
        let outcome = self
            .store
            .transaction(|state| {
                let result = state.remove_if_present(key);

                if !result.removed {
                    return Unpublished::NotQueued;
                }

                if !result.was_lead {
                    return Unpublished::LeftQueue;
                }

                state.set_last_streamer(Some(key));

                Unpublished::LeftSlot(self.promote_next_lead(state))
            })
            .await;

        match outcome {
            Unpublished::NotQueued => {
                log_debug!(self.logger, format!("Unpublish {}: not queued", key));
            }
            Unpublished::LeftQueue => {
                log_info!(self.logger, format!("Unpublish {}: left the queue", key));
            }
            Unpublished::LeftSlot(p) => {
                self.log_promotion(key, &p);
            }
        }
    }

    /// Checks if a stream must be forwarded to the output
    pub async fn on_forward(&self, key: &str) -> bool {
        self.store.peek().await.as_deref() == Some(key)
    }

    /// Evicts the current lead without waiting for it to unpublish
    ///
    /// # Arguments
    ///
    /// * `reason` - Why the lead is evicted
    ///
    /// # Return value
    ///
    /// Returns true if this call evicted the lead
    pub async fn force_evict(&self, reason: EvictionReason) -> bool {
        let lead = match self.store.peek().await {
            Some(l) => l,
            None => {
                log_debug!(
                    self.logger,
                    format!("Eviction ({}) ignored: there is no lead", reason)
                );
                return false;
            }
        };

        log_warning!(self.logger, format!("Evicting {} ({})", lead, reason));

        if let Err(e) = self.composer.kick_publisher(&lead).await {
            log_error!(self.logger, format!("Could not kick {}: {}", lead, e));
        }

        // The lead may have changed while kicking. A key that left
        // and queued again must not be removed.
        let promotion = self
            .store
            .transaction(|state| {
                if state.peek() != Some(lead.as_str()) {
                    return None;
                }

                state.remove_if_present(&lead);
                state.set_last_streamer(Some(&lead));

                Some(self.promote_next_lead(state))
            })
            .await;

        match promotion {
            Some(p) => {
                self.log_promotion(&lead, &p);
                true
            }
            None => {
                log_debug!(
                    self.logger,
                    format!("{} already left the slot during its eviction", lead)
                );
                false
            }
        }
    }

    /// Re-checks the lead after a switch job released the guard.
    /// If the lead changed meanwhile, a new switch is enqueued.
    pub async fn reconcile(&self, target: Option<&str>) -> Option<Promotion> {
        let promotion = self
            .store
            .transaction(|state| {
                if state.peek() == target {
                    return None;
                }

                Some(self.promote_next_lead(state))
            })
            .await;

        if let Some(p) = &promotion {
            log_info!(
                self.logger,
                format!("Lead changed during the switch to {:?}: {:?}", target, p)
            );
        }

        promotion
    }

    /// Enables or disables blocking
    pub async fn set_blocking(&self, enabled: bool) {
        self.store.set_blocking(enabled).await;

        log_info!(
            self.logger,
            format!("Blocking {}", if enabled { "enabled" } else { "disabled" })
        );
    }

    /// Gets the current lead
    pub async fn lead(&self) -> Option<String> {
        self.store.peek().await
    }

    /// Gets a copy of the queue state
    pub async fn queue_status(&self) -> QueueSnapshot {
        self.store.full_snapshot().await
    }

    /// Promotes the head of the queue to the output.
    /// Must run inside a queue transaction.
    fn promote_next_lead(&self, state: &QueueState) -> Promotion {
        let permit = match self.switch_in_flight.clone().try_lock_owned() {
            Ok(guard) => SwitchPermit::new(guard),
            Err(_) => return Promotion::Deferred,
        };

        match state.peek() {
            Some(next) => {
                self.jobs
                    .enqueue(JobKind::SwitchDynamicSource { permit }, Some(next));
                Promotion::Switch(next.to_string())
            }
            None => {
                self.jobs.enqueue(JobKind::StopOutput { permit }, None);
                Promotion::Stop
            }
        }
    }

    fn log_promotion(&self, evicted: &str, promotion: &Promotion) {
        match promotion {
            Promotion::Switch(next) => {
                log_info!(
                    self.logger,
                    format!("{} left the slot. Switching to {}", evicted, next)
                );
            }
            Promotion::Stop => {
                log_info!(
                    self.logger,
                    format!("{} left the slot. Queue is empty, stopping the output", evicted)
                );
            }
            Promotion::Deferred => {
                log_info!(
                    self.logger,
                    format!("{} left the slot while a switch is in flight", evicted)
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::future::join_all;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::{
        dispatcher::{job_channel, Job},
        testing::MockComposer,
    };

    struct TestController {
        controller: Arc<AdmissionController>,
        receiver: UnboundedReceiver<Job>,
        composer: Arc<MockComposer>,
    }

    fn make_controller(state: QueueState) -> TestController {
        let logger = Arc::new(Logger::new_disabled());
        let store = Arc::new(QueueStore::new(logger.clone(), state, None));
        let (jobs, receiver) = job_channel(std::time::Duration::ZERO);
        let composer = Arc::new(MockComposer::new());

        TestController {
            controller: Arc::new(AdmissionController::new(
                logger,
                store,
                jobs,
                composer.clone(),
            )),
            receiver,
            composer,
        }
    }

    fn queued(keys: &[&str]) -> QueueState {
        let mut state = QueueState::new(false);

        for k in keys {
            state.enqueue_if_absent(k);
        }

        state
    }

    fn drain(receiver: &mut UnboundedReceiver<Job>) -> Vec<Job> {
        std::iter::from_fn(|| receiver.try_recv().ok()).collect()
    }

    fn summary(jobs: &[Job]) -> Vec<(&'static str, Option<String>)> {
        jobs.iter().map(|j| (j.name(), j.target.clone())).collect()
    }

    #[tokio::test]
    async fn test_publish_to_empty_queue() {
        let mut t = make_controller(QueueState::new(false));

        assert_eq!(t.controller.on_publish("a").await, PublishDecision::Forward);
        assert_eq!(t.controller.store().snapshot().await, vec!["a"]);

        let jobs = drain(&mut t.receiver);
        assert_eq!(
            summary(&jobs),
            vec![("StartDynamicSource", Some("a".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_publish_behind_lead() {
        let mut t = make_controller(queued(&["a"]));

        assert_eq!(
            t.controller.on_publish("b").await,
            PublishDecision::EnqueueOnly
        );
        assert_eq!(t.controller.store().snapshot().await, vec!["a", "b"]);

        assert_eq!(
            t.controller.on_publish("b").await,
            PublishDecision::EnqueueOnly
        );
        assert_eq!(t.controller.store().snapshot().await, vec!["a", "b"]);

        assert!(drain(&mut t.receiver).is_empty());
    }

    #[tokio::test]
    async fn test_lead_publish_is_idempotent() {
        let mut t = make_controller(QueueState::new(false));

        t.controller.on_publish("a").await;
        let revision = t.controller.queue_status().await.revision;

        assert_eq!(t.controller.on_publish("a").await, PublishDecision::Forward);
        assert_eq!(t.controller.queue_status().await.revision, revision);

        assert_eq!(drain(&mut t.receiver).len(), 1);
    }

    #[tokio::test]
    async fn test_lead_unpublish_promotes_next() {
        let mut t = make_controller(queued(&["a", "b"]));

        t.controller.on_unpublish("a").await;

        assert_eq!(t.controller.store().snapshot().await, vec!["b"]);
        assert_eq!(
            t.controller.store().last_streamer().await.as_deref(),
            Some("a")
        );

        let jobs = drain(&mut t.receiver);
        assert_eq!(
            summary(&jobs),
            vec![("SwitchDynamicSource", Some("b".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_last_lead_unpublish_stops_output() {
        let mut t = make_controller(queued(&["a"]));

        t.controller.on_unpublish("a").await;

        assert!(t.controller.store().snapshot().await.is_empty());

        let jobs = drain(&mut t.receiver);
        assert_eq!(summary(&jobs), vec![("StopOutput", None)]);
    }

    #[tokio::test]
    async fn test_queued_unpublish() {
        let mut t = make_controller(queued(&["a", "b", "c"]));

        t.controller.on_unpublish("b").await;
        t.controller.on_unpublish("x").await;

        assert_eq!(t.controller.store().snapshot().await, vec!["a", "c"]);
        assert_eq!(t.controller.store().last_streamer().await, None);
        assert!(drain(&mut t.receiver).is_empty());
    }

    #[tokio::test]
    async fn test_blocking_rejects_last_streamer() {
        let mut t = make_controller(QueueState::new(true));

        t.controller.store().set_last_streamer(Some("a")).await;

        assert_eq!(t.controller.on_publish("a").await, PublishDecision::Reject);
        assert!(t.controller.store().snapshot().await.is_empty());
        assert!(drain(&mut t.receiver).is_empty());

        // Another publisher takes the slot and clears the last streamer
        assert_eq!(t.controller.on_publish("b").await, PublishDecision::Forward);
        assert_eq!(t.controller.store().last_streamer().await, None);
    }

    #[tokio::test]
    async fn test_blocking_disabled_readmits_last_streamer() {
        let t = make_controller(queued(&["a"]));

        t.controller.on_unpublish("a").await;

        assert_eq!(t.controller.on_publish("a").await, PublishDecision::Forward);
        assert_eq!(t.controller.lead().await.as_deref(), Some("a"));
        assert_eq!(t.controller.store().last_streamer().await, None);
    }

    #[tokio::test]
    async fn test_blocking_toggle() {
        let t = make_controller(queued(&["a"]));

        t.controller.set_blocking(true).await;
        t.controller.on_unpublish("a").await;

        assert_eq!(t.controller.on_publish("a").await, PublishDecision::Reject);

        t.controller.set_blocking(false).await;

        assert_eq!(t.controller.on_publish("a").await, PublishDecision::Forward);
    }

    #[tokio::test]
    async fn test_concurrent_publish_single_forward() {
        let t = make_controller(QueueState::new(false));

        let decisions = join_all((0..100).map(|i| {
            let controller = t.controller.clone();
            tokio::spawn(async move { controller.on_publish(&format!("key-{}", i)).await })
        }))
        .await;

        let forwards = decisions
            .iter()
            .filter(|d| *d.as_ref().unwrap() == PublishDecision::Forward)
            .count();
        let enqueued = decisions
            .iter()
            .filter(|d| *d.as_ref().unwrap() == PublishDecision::EnqueueOnly)
            .count();

        assert_eq!(forwards, 1);
        assert_eq!(enqueued, 99);
        assert_eq!(t.controller.store().snapshot().await.len(), 100);
    }

    #[tokio::test]
    async fn test_on_forward() {
        let t = make_controller(queued(&["a", "b"]));

        assert!(t.controller.on_forward("a").await);
        assert!(!t.controller.on_forward("b").await);
        assert!(!t.controller.on_forward("x").await);
    }

    #[tokio::test]
    async fn test_evict_without_lead() {
        let mut t = make_controller(QueueState::new(false));

        assert!(!t.controller.force_evict(EvictionReason::Operator).await);
        assert!(t.composer.kicked().is_empty());
        assert!(drain(&mut t.receiver).is_empty());
    }

    #[tokio::test]
    async fn test_evict_kicks_and_promotes() {
        let mut t = make_controller(queued(&["a", "b"]));

        assert!(t.controller.force_evict(EvictionReason::Health).await);

        assert_eq!(t.composer.kicked(), vec!["a"]);
        assert_eq!(t.controller.store().snapshot().await, vec!["b"]);
        assert_eq!(
            t.controller.store().last_streamer().await.as_deref(),
            Some("a")
        );

        // The dropped connection unpublishes afterwards
        t.controller.on_unpublish("a").await;

        let jobs = drain(&mut t.receiver);
        assert_eq!(
            summary(&jobs),
            vec![("SwitchDynamicSource", Some("b".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_evict_during_switch_is_deferred() {
        let mut t = make_controller(queued(&["a", "b", "c"]));

        assert!(t.controller.force_evict(EvictionReason::Operator).await);

        // The switch job to b still holds the guard
        assert!(t.controller.force_evict(EvictionReason::Operator).await);
        assert_eq!(t.composer.kicked(), vec!["a", "b"]);
        assert_eq!(t.controller.store().snapshot().await, vec!["c"]);

        let switch_jobs = drain(&mut t.receiver);
        assert_eq!(
            summary(&switch_jobs),
            vec![("SwitchDynamicSource", Some("b".to_string()))]
        );

        drop(switch_jobs);

        assert_eq!(
            t.controller.reconcile(Some("b")).await,
            Some(Promotion::Switch("c".to_string()))
        );
        assert_eq!(
            summary(&drain(&mut t.receiver)),
            vec![("SwitchDynamicSource", Some("c".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_evict_keeps_lead_that_queued_again() {
        let mut t = make_controller(queued(&["a", "b"]));

        t.composer.hold_kicks();

        let controller = t.controller.clone();
        let eviction =
            tokio::spawn(async move { controller.force_evict(EvictionReason::Health).await });

        while t.composer.kicked().is_empty() {
            tokio::task::yield_now().await;
        }

        // The kicked connection drops and the client reconnects
        t.controller.on_unpublish("a").await;
        assert_eq!(
            t.controller.on_publish("a").await,
            PublishDecision::EnqueueOnly
        );

        t.composer.release_kicks();

        assert!(!eviction.await.unwrap());
        assert_eq!(t.controller.store().snapshot().await, vec!["b", "a"]);
        assert_eq!(
            summary(&drain(&mut t.receiver)),
            vec![("SwitchDynamicSource", Some("b".to_string()))]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_evictions_promote_once() {
        let mut t = make_controller(queued(&["a", "b", "c"]));

        t.composer.hold_kicks();

        let mut tasks = Vec::new();

        for _ in 0..10 {
            let controller = t.controller.clone();
            tasks.push(tokio::spawn(async move {
                controller.force_evict(EvictionReason::Health).await;
            }));
        }

        // Every eviction targets a
        while t.composer.kicked().len() < 10 {
            tokio::task::yield_now().await;
        }

        let controller = t.controller.clone();
        tasks.push(tokio::spawn(async move {
            controller.on_unpublish("a").await;
        }));

        t.composer.release_kicks();

        for task in join_all(tasks).await {
            task.unwrap();
        }

        let jobs = drain(&mut t.receiver);
        assert_eq!(
            summary(&jobs),
            vec![("SwitchDynamicSource", Some("b".to_string()))]
        );

        assert_eq!(t.controller.store().snapshot().await, vec!["b", "c"]);
        assert_eq!(
            t.controller.store().last_streamer().await.as_deref(),
            Some("a")
        );
        assert!(t.composer.kicked().iter().all(|k| k == "a"));
    }

    #[tokio::test]
    async fn test_reconcile_after_lead_change() {
        let mut t = make_controller(queued(&["a", "b"]));

        t.controller.on_unpublish("a").await;

        let switch_jobs = drain(&mut t.receiver);
        assert_eq!(switch_jobs.len(), 1);

        // b leaves while the switch to b is in flight
        t.controller.on_unpublish("b").await;
        assert!(drain(&mut t.receiver).is_empty());

        drop(switch_jobs);

        assert_eq!(
            t.controller.reconcile(Some("b")).await,
            Some(Promotion::Stop)
        );
        assert_eq!(
            summary(&drain(&mut t.receiver)),
            vec![("StopOutput", None)]
        );
    }

    #[tokio::test]
    async fn test_reconcile_without_change() {
        let mut t = make_controller(queued(&["a", "b"]));

        t.controller.on_unpublish("a").await;
        drop(drain(&mut t.receiver));

        assert_eq!(t.controller.reconcile(Some("b")).await, None);
        assert!(drain(&mut t.receiver).is_empty());
    }

    #[tokio::test]
    async fn test_last_streamer_never_lead() {
        let t = make_controller(queued(&["a", "b"]));

        t.controller.on_unpublish("a").await;
        t.controller.on_publish("a").await;

        let status = t.controller.queue_status().await;
        assert_eq!(status.queue, vec!["b", "a"]);
        assert_eq!(status.last_streamer.as_deref(), Some("a"));

        t.controller.on_unpublish("b").await;

        // a became the lead, so b replaces it as the last streamer
        let status = t.controller.queue_status().await;
        assert_eq!(status.queue, vec!["a"]);
        assert_eq!(status.last_streamer.as_deref(), Some("b"));
    }
}
