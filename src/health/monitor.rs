// Health monitor

use std::sync::Arc;

use tokio::{
    sync::{
        mpsc::{self, UnboundedSender},
        watch,
    },
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

use crate::{
    admission::{AdmissionController, EvictionReason},
    dispatcher::{JobKind, JobSender, ProbeReport},
    log::Logger,
    log_debug, log_info, log_trace, log_warning,
};

use super::{HealthConfiguration, HealthState, HealthThreshold};

/// Probes the output while there is a lead and
/// evicts the lead after a long enough failure streak.
///
/// Probes run as dispatcher jobs. The monitor only talks to the rest of
/// the system through the job queue and `force_evict`.
pub struct HealthMonitor {
    logger: Arc<Logger>,
    config: HealthConfiguration,
    controller: Arc<AdmissionController>,
    jobs: JobSender,
    lead_receiver: watch::Receiver<Option<String>>,
    threshold: HealthThreshold,
}

impl HealthMonitor {
    /// Creates new HealthMonitor
    ///
    /// # Arguments
    ///
    /// * `logger` - The logger
    /// * `config` - Health monitor configuration
    /// * `controller` - Admission controller, for evictions
    /// * `threshold` - Failure threshold, shared with the admin routes
    pub fn new(
        logger: Arc<Logger>,
        config: HealthConfiguration,
        controller: Arc<AdmissionController>,
        threshold: HealthThreshold,
    ) -> HealthMonitor {
        let jobs = controller.jobs().clone();
        let lead_receiver = controller.store().subscribe_lead();

        HealthMonitor {
            logger,
            config,
            controller,
            jobs,
            lead_receiver,
            threshold,
        }
    }

    /// Spawns the monitor task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs the monitor until the queue store is dropped
    pub async fn run(mut self) {
        let (reply_sender, mut reply_receiver) = mpsc::unbounded_channel::<ProbeReport>();

        let mut state = HealthState::new(self.lead_receiver.borrow_and_update().clone());

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log_info!(
            self.logger,
            format!(
                "Probing {} every {} ms",
                self.config.output_probe_url,
                self.config.interval.as_millis()
            )
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.on_tick(&mut state, &reply_sender);
                }
                Some(report) = reply_receiver.recv() => {
                    self.on_report(&mut state, report).await;
                }
                changed = self.lead_receiver.changed() => {
                    if changed.is_err() {
                        break;
                    }

                    let lead = self.lead_receiver.borrow_and_update().clone();

                    log_debug!(self.logger, format!("Watching lead {:?}", lead));

                    state.reset(lead);
                }
            }
        }

        log_debug!(self.logger, "Queue store closed");
    }

    fn on_tick(&self, state: &mut HealthState, reply_sender: &UnboundedSender<ProbeReport>) {
        let lead = match &state.lead {
            Some(l) => l.clone(),
            None => return,
        };

        if state.probe_in_flight {
            log_trace!(self.logger, "Previous probe still in flight, skipping tick");
            return;
        }

        state.probe_in_flight = self.jobs.enqueue(
            JobKind::HealthProbe {
                url: self.config.output_probe_url.clone(),
                timeout: self.config.probe_timeout,
                reply: reply_sender.clone(),
            },
            Some(&lead),
        );
    }

    async fn on_report(&self, state: &mut HealthState, report: ProbeReport) {
        state.probe_in_flight = false;

        if state.lead.as_deref() != Some(report.lead.as_str()) {
            log_trace!(
                self.logger,
                format!("Discarded probe report of previous lead {}", report.lead)
            );
            return;
        }

        if report.reachable {
            if state.record_success() {
                log_info!(
                    self.logger,
                    format!("Output recovered while {} is live", report.lead)
                );
            }

            return;
        }

        let failing_for = state.record_failure(Instant::now());
        let threshold = self.threshold.get();

        log_debug!(
            self.logger,
            format!(
                "Output unreachable for {} ms (lead: {})",
                failing_for.as_millis(),
                report.lead
            )
        );

        if failing_for < threshold {
            return;
        }

        log_warning!(
            self.logger,
            format!(
                "Output unreachable for {} ms, evicting {}",
                failing_for.as_millis(),
                report.lead
            )
        );

        state.first_failure_at = None;

        self.controller.force_evict(EvictionReason::Health).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        dispatcher::{job_channel, DispatcherConfiguration, JobDispatcher},
        queue::{QueueState, QueueStore},
        testing::{MockComposer, MockProber},
    };

    struct TestSystem {
        controller: Arc<AdmissionController>,
        composer: Arc<MockComposer>,
        prober: Arc<MockProber>,
        threshold: HealthThreshold,
    }

    fn health_config() -> HealthConfiguration {
        HealthConfiguration {
            enabled: true,
            output_probe_url: "http://output/live".to_string(),
            interval: Duration::from_secs(3),
            probe_timeout: Duration::from_secs(3),
            failure_threshold: Duration::from_secs(30),
        }
    }

    fn start_system(keys: &[&str], reachable: bool) -> TestSystem {
        let logger = Arc::new(Logger::new_disabled());

        let mut state = QueueState::new(false);
        for k in keys {
            state.enqueue_if_absent(k);
        }

        let store = Arc::new(QueueStore::new(logger.clone(), state, None));

        let dispatcher_config = DispatcherConfiguration {
            relay_url_template: "rtmp://relay/live/{key}".to_string(),
            ..DispatcherConfiguration::default()
        };

        let (jobs, receiver) = job_channel(dispatcher_config.min_delay);
        let composer = Arc::new(MockComposer::new());
        let prober = Arc::new(MockProber::new(reachable));

        JobDispatcher::new(
            logger.clone(),
            dispatcher_config,
            composer.clone(),
            prober.clone(),
            &jobs,
            None,
        )
        .spawn(receiver);

        let controller = Arc::new(AdmissionController::new(
            logger.clone(),
            store,
            jobs,
            composer.clone(),
        ));

        let config = health_config();
        let threshold = HealthThreshold::new(config.failure_threshold);

        HealthMonitor::new(logger, config, controller.clone(), threshold.clone()).spawn();

        TestSystem {
            controller,
            composer,
            prober,
            threshold,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sustained_failure_evicts_once() {
        let t = start_system(&["c"], false);

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert!(t.composer.kicked().is_empty());

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(t.composer.kicked(), vec!["c"]);
        assert_eq!(
            t.controller.store().last_streamer().await.as_deref(),
            Some("c")
        );
        assert!(t.controller.store().snapshot().await.is_empty());

        // No lead, nothing else to probe or evict
        let probes = t.prober.probe_count();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(t.composer.kicked(), vec!["c"]);
        assert_eq!(t.prober.probe_count(), probes);
    }

    #[tokio::test(start_paused = true)]
    async fn test_healthy_output_never_evicts() {
        let t = start_system(&["a", "b"], true);

        tokio::time::sleep(Duration::from_secs(120)).await;

        assert!(t.composer.kicked().is_empty());
        assert!(t.prober.probe_count() > 10);
        assert_eq!(t.controller.lead().await.as_deref(), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_resets_streak() {
        let t = start_system(&["a"], false);

        tokio::time::sleep(Duration::from_secs(20)).await;
        t.prober.set_reachable(true);

        tokio::time::sleep(Duration::from_secs(10)).await;
        t.prober.set_reachable(false);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(t.composer.kicked().is_empty());

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(t.composer.kicked(), vec!["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lead_change_resets_streak() {
        let t = start_system(&["a", "b"], false);

        tokio::time::sleep(Duration::from_secs(20)).await;
        t.controller.on_unpublish("a").await;

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(t.composer.kicked().is_empty());

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(t.composer.kicked(), vec!["b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_threshold_adjustable() {
        let t = start_system(&["a"], false);

        t.threshold.set(Duration::from_secs(6));

        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(t.composer.kicked(), vec!["a"]);
    }
}
