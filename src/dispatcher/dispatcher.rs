// Job dispatcher

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::mpsc::{UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
    time::Instant,
};

use crate::{
    composer::{InputStatus, MediaComposer},
    log::Logger,
    log_debug, log_error, log_info, log_trace, log_warning,
    probe::OutputProber,
};

use super::{
    DispatchError, DispatcherConfiguration, DynamicSource, Job, JobKind, JobSender, ProbeReport,
    SourceState, SwitchCompletion, SwitchPermit, WeakJobSender,
};

/// Extra time given to a prober over its own timeout
const PROBE_TIMEOUT_MARGIN: Duration = Duration::from_millis(500);

/// Operation against the composer, retried while the composer is unavailable
enum ComposerOperation {
    Start(String),
    Switch(String),
    Stop,
    Remove(String),
}

/// Single worker executing jobs in FIFO order.
///
/// Owns the dynamic sources: nothing else creates or removes them.
pub struct JobDispatcher {
    logger: Arc<Logger>,
    config: DispatcherConfiguration,
    composer: Arc<dyn MediaComposer>,
    prober: Arc<dyn OutputProber>,

    /// Used to read the min delay and to enqueue cleanup jobs
    jobs: WeakJobSender,

    completion_sender: Option<UnboundedSender<SwitchCompletion>>,

    /// Source currently visible
    active: Option<DynamicSource>,

    /// Time of the last job touching the composer
    last_dispatch: Option<Instant>,

    source_counter: u64,
}

impl JobDispatcher {
    /// Creates new JobDispatcher
    ///
    /// # Arguments
    ///
    /// * `logger` - The logger
    /// * `config` - Dispatcher configuration
    /// * `composer` - The media composer
    /// * `prober` - The output prober
    /// * `jobs` - Sender of the queue this dispatcher drains
    /// * `completion_sender` - Notified when a job holding a switch permit finishes
    pub fn new(
        logger: Arc<Logger>,
        config: DispatcherConfiguration,
        composer: Arc<dyn MediaComposer>,
        prober: Arc<dyn OutputProber>,
        jobs: &JobSender,
        completion_sender: Option<UnboundedSender<SwitchCompletion>>,
    ) -> JobDispatcher {
        JobDispatcher {
            logger,
            config,
            composer,
            prober,
            jobs: jobs.downgrade(),
            completion_sender,
            active: None,
            last_dispatch: None,
            source_counter: 0,
        }
    }

    /// Spawns the worker task
    pub fn spawn(self, receiver: UnboundedReceiver<Job>) -> JoinHandle<()> {
        tokio::spawn(self.run(receiver))
    }

    /// Drains the queue until every sender is gone
    pub async fn run(mut self, mut receiver: UnboundedReceiver<Job>) {
        while let Some(job) = receiver.recv().await {
            self.execute(job).await;
        }

        log_debug!(self.logger, "Job queue closed");
    }

    /// Key of the visible source
    pub fn active_key(&self) -> Option<&str> {
        self.active.as_ref().map(|s| s.key.as_str())
    }

    /// Executes a job
    pub async fn execute(&mut self, job: Job) {
        let name = job.name();

        log_trace!(
            self.logger,
            format!(
                "{} ({:?}) waited {} ms",
                name,
                job.target,
                job.enqueued_at.elapsed().as_millis()
            )
        );

        let Job { kind, target, .. } = job;

        match kind {
            JobKind::StartDynamicSource => {
                let key = match target {
                    Some(k) => k,
                    None => {
                        log_warning!(self.logger, "StartDynamicSource without a stream key");
                        return;
                    }
                };

                if self.active_key() == Some(key.as_str()) {
                    log_info!(self.logger, format!("Source for {} is already active", key));
                    return;
                }

                self.run_operation(name, ComposerOperation::Start(key)).await;
            }
            JobKind::SwitchDynamicSource { permit } => {
                let key = match target {
                    Some(k) => k,
                    None => {
                        log_warning!(self.logger, "SwitchDynamicSource without a stream key");
                        self.complete_switch(permit, None, false);
                        return;
                    }
                };

                let success = if self.active_key() == Some(key.as_str()) {
                    log_info!(self.logger, format!("Output already shows {}", key));
                    true
                } else {
                    self.run_operation(name, ComposerOperation::Switch(key.clone()))
                        .await
                };

                self.complete_switch(permit, Some(key), success);
            }
            JobKind::StopOutput { permit } => {
                let success = self.run_operation(name, ComposerOperation::Stop).await;

                self.complete_switch(permit, None, success);
            }
            JobKind::RemoveSource { name: source_name } => {
                self.run_operation(name, ComposerOperation::Remove(source_name))
                    .await;
            }
            JobKind::HealthProbe {
                url,
                timeout,
                reply,
            } => {
                let lead = match target {
                    Some(k) => k,
                    None => return,
                };

                let reachable = tokio::time::timeout(
                    timeout + PROBE_TIMEOUT_MARGIN,
                    self.prober.probe_reachable(&url, timeout),
                )
                .await
                .unwrap_or(false);

                log_trace!(
                    self.logger,
                    format!("Probe of {}: reachable={}", url, reachable)
                );

                _ = reply.send(ProbeReport { lead, reachable });
            }
        }
    }

    /// Releases a switch permit, then notifies the completion
    fn complete_switch(&self, permit: SwitchPermit, target: Option<String>, success: bool) {
        drop(permit);

        if let Some(sender) = &self.completion_sender {
            _ = sender.send(SwitchCompletion { target, success });
        }
    }

    /// Runs an operation, retrying while the composer is unavailable
    ///
    /// Returns true on success
    async fn run_operation(&mut self, job_name: &str, operation: ComposerOperation) -> bool {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            self.pace().await;

            let result = match &operation {
                ComposerOperation::Start(key) | ComposerOperation::Switch(key) => {
                    self.switch_dynamic_source(key).await
                }
                ComposerOperation::Stop => self.stop_output().await,
                ComposerOperation::Remove(name) => self.remove_source(name).await,
            };

            match result {
                Ok(_) => return true,
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    log_warning!(
                        self.logger,
                        format!(
                            "{} failed (attempt {}/{}): {}. Retrying in {} ms",
                            job_name,
                            attempt,
                            max_attempts,
                            e,
                            self.config.retry_interval.as_millis()
                        )
                    );

                    tokio::time::sleep(self.config.retry_interval).await;
                }
                Err(e) => {
                    if e.is_retryable() {
                        log_error!(
                            self.logger,
                            format!("{} dropped after {} attempts: {}", job_name, attempt, e)
                        );
                    } else {
                        log_error!(self.logger, format!("{} failed: {}", job_name, e));
                    }

                    return false;
                }
            }
        }
    }

    /// Waits until the min delay since the last composer job has passed
    async fn pace(&mut self) {
        let min_delay = self.jobs.min_delay();

        if let Some(last) = self.last_dispatch {
            let next = last + min_delay;

            if next > Instant::now() {
                log_trace!(
                    self.logger,
                    format!(
                        "Rate limit: waiting {} ms",
                        (next - Instant::now()).as_millis()
                    )
                );

                tokio::time::sleep_until(next).await;
            }
        }

        self.last_dispatch = Some(Instant::now());
    }

    /// Generates a unique input name for a key
    fn next_source_name(&mut self, key: &str) -> String {
        self.source_counter += 1;

        format!(
            "{}-{}-{}-{}",
            self.config.source_name_prefix,
            key,
            self.source_counter,
            hex::encode(rand::random::<[u8; 3]>())
        )
    }

    /// Brings up a source for the key and swaps it with the active one.
    ///
    /// On failure the half-created input is removed
    /// and the active source is left untouched.
    /// Nothing is removed if the input was never created.
    async fn switch_dynamic_source(&mut self, key: &str) -> Result<(), DispatchError> {
        let name = self.next_source_name(key);
        let url = self.config.relay_url(key);

        let mut source = DynamicSource::new(name, key, url);

        log_info!(
            self.logger,
            format!("Creating source {} for {} ({})", &source.name, key, &source.url)
        );

        if let Err(e) = self.composer.create_input(&source.name, &source.url).await {
            source.set_state(SourceState::Failed);
            return Err(DispatchError::source_creation(key, e));
        }

        source.set_state(SourceState::Buffering);

        if let Err(e) = self.wait_until_playing(&mut source).await {
            self.discard_source(&mut source).await;
            return Err(e);
        }

        if let Err(e) = self.composer.set_visible(&source.name, true).await {
            self.discard_source(&mut source).await;
            return Err(DispatchError::source_creation(key, e));
        }

        log_info!(
            self.logger,
            format!(
                "Source {} is live after {} ms",
                &source.name,
                source.created_at.elapsed().as_millis()
            )
        );

        if let Some(previous) = self.active.replace(source) {
            tokio::time::sleep(self.config.swap_grace).await;

            self.retire_source(previous).await;
        }

        Ok(())
    }

    /// Polls the status of a new source until it plays
    async fn wait_until_playing(&self, source: &mut DynamicSource) -> Result<(), DispatchError> {
        let deadline = Instant::now() + self.config.ready_timeout;

        loop {
            match self.composer.get_input_status(&source.name).await {
                Ok(InputStatus::Playing) => {
                    source.set_state(SourceState::Playing);
                    return Ok(());
                }
                Ok(status) if status.is_terminal_failure() => {
                    source.set_state(SourceState::Failed);

                    return Err(DispatchError::SourceCreation {
                        key: source.key.clone(),
                        reason: format!("input reported {:?}", status),
                    });
                }
                Ok(status) => {
                    log_trace!(self.logger, format!("{}: {:?}", &source.name, status));
                }
                Err(e) if e.is_unavailable() => {
                    source.set_state(SourceState::Failed);
                    return Err(DispatchError::source_creation(&source.key, e));
                }
                Err(e) => {
                    log_debug!(
                        self.logger,
                        format!("Could not get the status of {}: {}", &source.name, e)
                    );
                }
            }

            if Instant::now() >= deadline {
                source.set_state(SourceState::Failed);

                return Err(DispatchError::SourceCreation {
                    key: source.key.clone(),
                    reason: format!(
                        "not playing after {} ms",
                        self.config.ready_timeout.as_millis()
                    ),
                });
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Removes a source that never went live.
    /// The relay connection is not torn down.
    async fn discard_source(&self, source: &mut DynamicSource) {
        source.set_state(SourceState::Failed);

        match self.composer.remove_input(&source.name).await {
            Ok(_) => {
                source.set_state(SourceState::Removed);
            }
            Err(e) => {
                log_warning!(
                    self.logger,
                    format!("Could not remove abandoned source {}: {}", &source.name, e)
                );

                if e.is_unavailable() {
                    self.jobs.enqueue(
                        JobKind::RemoveSource {
                            name: source.name.clone(),
                        },
                        Some(&source.key),
                    );
                }
            }
        }
    }

    /// Hides and removes a source that was visible
    async fn retire_source(&self, mut source: DynamicSource) {
        if let Err(e) = self.composer.set_visible(&source.name, false).await {
            log_debug!(
                self.logger,
                format!("Could not hide source {}: {}", &source.name, e)
            );
        }

        match self.composer.remove_input(&source.name).await {
            Ok(_) => {
                source.set_state(SourceState::Removed);

                log_info!(
                    self.logger,
                    format!("Removed source {} ({})", &source.name, &source.key)
                );
            }
            Err(e) => {
                log_warning!(
                    self.logger,
                    format!("Could not remove source {}: {}", &source.name, e)
                );

                if e.is_unavailable() {
                    self.jobs.enqueue(
                        JobKind::RemoveSource {
                            name: source.name.clone(),
                        },
                        Some(&source.key),
                    );
                }
            }
        }
    }

    /// Removes the active source
    async fn stop_output(&mut self) -> Result<(), DispatchError> {
        let source = match self.active.take() {
            Some(s) => s,
            None => {
                log_debug!(self.logger, "Output already stopped");
                return Ok(());
            }
        };

        log_info!(
            self.logger,
            format!("Stopping output of {} ({})", &source.key, &source.name)
        );

        self.retire_source(source).await;

        Ok(())
    }

    /// Removes an input by name
    async fn remove_source(&mut self, name: &str) -> Result<(), DispatchError> {
        self.composer.remove_input(name).await?;

        if self.active.as_ref().is_some_and(|s| s.name == name) {
            self.active = None;
        }

        log_info!(self.logger, format!("Removed source {}", name));

        Ok(())
    }
}
