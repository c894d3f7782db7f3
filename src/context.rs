// Arbiter context

use std::{path::PathBuf, sync::Arc};

use tokio::sync::mpsc;

use crate::{
    admission::{spawn_task_switch_reconciler, AdmissionController},
    composer::MediaComposer,
    dispatcher::{job_channel, DispatcherConfiguration, JobDispatcher, JobKind},
    health::{HealthConfiguration, HealthMonitor, HealthThreshold},
    log::Logger,
    log_info,
    probe::OutputProber,
    queue::{load_queue_snapshot, spawn_task_snapshot_writer, QueueState, QueueStore},
    utils::{get_env_bool, get_env_string},
};

/// Configuration of the arbiter core
#[derive(Clone)]
pub struct ArbiterConfiguration {
    /// Queue snapshot file. None disables persistence.
    pub snapshot_path: Option<PathBuf>,

    /// Blocking toggle when there is no snapshot
    pub blocking_enabled: bool,

    pub dispatcher: DispatcherConfiguration,

    pub health: HealthConfiguration,
}

impl ArbiterConfiguration {
    pub fn load_from_env(logger: &Logger) -> Result<ArbiterConfiguration, ()> {
        let snapshot_path = get_env_string("QUEUE_SNAPSHOT_PATH", "queue.json");

        Ok(ArbiterConfiguration {
            snapshot_path: if snapshot_path.is_empty() {
                None
            } else {
                Some(PathBuf::from(snapshot_path))
            },
            blocking_enabled: get_env_bool("BLOCKING_ENABLED", false),
            dispatcher: DispatcherConfiguration::load_from_env(logger)?,
            health: HealthConfiguration::load_from_env(logger)?,
        })
    }
}

/// Running arbiter: the queue, the admission controller
/// and the handles the admin routes need
pub struct ArbiterContext {
    pub controller: Arc<AdmissionController>,
    pub dispatcher_config: DispatcherConfiguration,
    pub health_threshold: HealthThreshold,
}

impl ArbiterContext {
    /// Restores the queue and spawns the background tasks
    ///
    /// # Arguments
    ///
    /// * `logger` - The root logger
    /// * `config` - The configuration
    /// * `composer` - The media composer
    /// * `prober` - The output prober
    pub async fn start(
        logger: &Logger,
        config: ArbiterConfiguration,
        composer: Arc<dyn MediaComposer>,
        prober: Arc<dyn OutputProber>,
    ) -> ArbiterContext {
        let queue_logger = Arc::new(logger.make_child_logger("[QUEUE] "));

        // Restore the queue

        let mut state = QueueState::new(config.blocking_enabled);
        let mut snapshot_sender = None;

        if let Some(path) = &config.snapshot_path {
            if let Some(snapshot) = load_queue_snapshot(&queue_logger, path).await {
                state = QueueState::from_snapshot(snapshot);
            }

            let (sender, receiver) = mpsc::unbounded_channel();

            spawn_task_snapshot_writer(queue_logger.clone(), path.clone(), receiver);

            snapshot_sender = Some(sender);
        }

        let restored_lead = state.peek().map(|k| k.to_string());

        let store = Arc::new(QueueStore::new(queue_logger, state, snapshot_sender));

        // Dispatcher

        let (jobs, job_receiver) = job_channel(config.dispatcher.min_delay);
        let (completion_sender, completion_receiver) = mpsc::unbounded_channel();

        JobDispatcher::new(
            Arc::new(logger.make_child_logger("[DISPATCHER] ")),
            config.dispatcher.clone(),
            composer.clone(),
            prober,
            &jobs,
            Some(completion_sender),
        )
        .spawn(job_receiver);

        // Admission

        let controller = Arc::new(AdmissionController::new(
            Arc::new(logger.make_child_logger("[ADMISSION] ")),
            store,
            jobs,
            composer,
        ));

        spawn_task_switch_reconciler(controller.clone(), completion_receiver);

        if let Some(lead) = restored_lead {
            log_info!(logger, format!("Bringing back the output of {}", lead));

            controller
                .jobs()
                .enqueue(JobKind::StartDynamicSource, Some(&lead));
        }

        // Health

        let health_threshold = HealthThreshold::new(config.health.failure_threshold);

        if config.health.enabled {
            HealthMonitor::new(
                Arc::new(logger.make_child_logger("[HEALTH] ")),
                config.health.clone(),
                controller.clone(),
                health_threshold.clone(),
            )
            .spawn();
        } else {
            log_info!(logger, "Health monitor disabled");
        }

        ArbiterContext {
            controller,
            dispatcher_config: config.dispatcher,
            health_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        queue::{write_queue_snapshot, QueueSnapshot},
        testing::{MockComposer, MockProber},
    };

    fn test_config(snapshot_path: Option<PathBuf>) -> ArbiterConfiguration {
        ArbiterConfiguration {
            snapshot_path,
            blocking_enabled: false,
            dispatcher: DispatcherConfiguration {
                relay_url_template: "rtmp://relay/live/{key}".to_string(),
                ..DispatcherConfiguration::default()
            },
            health: HealthConfiguration {
                enabled: false,
                output_probe_url: "".to_string(),
                interval: Duration::from_secs(3),
                probe_timeout: Duration::from_secs(3),
                failure_threshold: Duration::from_secs(30),
            },
        }
    }

    fn temp_snapshot_path() -> PathBuf {
        std::env::temp_dir().join(format!(
            "arbiter-context-{}.json",
            hex::encode(rand::random::<[u8; 8]>())
        ))
    }

    #[tokio::test]
    async fn test_restores_queue_and_output() {
        let path = temp_snapshot_path();

        write_queue_snapshot(
            &path,
            &QueueSnapshot {
                queue: vec!["a".to_string(), "b".to_string()],
                last_streamer: Some("c".to_string()),
                blocking_enabled: true,
                revision: 7,
                saved_at: None,
            },
        )
        .await
        .unwrap();

        let composer = Arc::new(MockComposer::new());

        let context = ArbiterContext::start(
            &Logger::new_disabled(),
            test_config(Some(path.clone())),
            composer.clone(),
            Arc::new(MockProber::new(true)),
        )
        .await;

        let status = context.controller.queue_status().await;
        assert_eq!(status.queue, vec!["a", "b"]);
        assert_eq!(status.last_streamer.as_deref(), Some("c"));
        assert!(status.blocking_enabled);

        for _ in 0..50 {
            if !composer.visible_urls().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert_eq!(composer.visible_urls(), vec!["rtmp://relay/live/a"]);

        _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_mutations_are_persisted() {
        let path = temp_snapshot_path();

        let context = ArbiterContext::start(
            &Logger::new_disabled(),
            test_config(Some(path.clone())),
            Arc::new(MockComposer::new()),
            Arc::new(MockProber::new(true)),
        )
        .await;

        context.controller.on_publish("a").await;
        context.controller.on_publish("b").await;

        let mut restored = None;

        for _ in 0..50 {
            restored = load_queue_snapshot(&Logger::new_disabled(), &path).await;

            if restored.as_ref().is_some_and(|s| s.queue.len() == 2) {
                break;
            }

            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert_eq!(restored.unwrap().queue, vec!["a", "b"]);

        _ = tokio::fs::remove_file(&path).await;
    }
}
