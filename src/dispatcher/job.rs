// Jobs executed by the dispatcher

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{
    sync::{
        mpsc::{self, UnboundedReceiver, UnboundedSender},
        OwnedMutexGuard,
    },
    time::Instant,
};

/// Proof that the holder runs the promote-next-lead routine.
/// Dropping it releases the switch guard.
pub struct SwitchPermit {
    _guard: OwnedMutexGuard<()>,
}

impl SwitchPermit {
    pub fn new(guard: OwnedMutexGuard<()>) -> SwitchPermit {
        SwitchPermit { _guard: guard }
    }
}

/// Result of a health probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    /// Lead at the time the probe was requested
    pub lead: String,

    /// True if the output was reachable
    pub reachable: bool,
}

/// Sent when a job holding a switch permit finishes,
/// after the permit has been released
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchCompletion {
    /// Key the output was switched to, None for a stop
    pub target: Option<String>,

    /// True if the output now shows the target
    pub success: bool,
}

/// Kind of job, with its payload
pub enum JobKind {
    /// Brings up the source of the target key, no-op if already active
    StartDynamicSource,

    /// Replaces the active source by one for the target key
    SwitchDynamicSource { permit: SwitchPermit },

    /// Removes the active source, leaving the output empty
    StopOutput { permit: SwitchPermit },

    /// Removes an input by name
    RemoveSource { name: String },

    /// Checks the output, reporting the result to the health monitor
    HealthProbe {
        url: String,
        timeout: Duration,
        reply: UnboundedSender<ProbeReport>,
    },
}

/// Unit of work for the dispatcher
pub struct Job {
    pub kind: JobKind,

    /// Stream key the job is about
    pub target: Option<String>,

    pub enqueued_at: Instant,
}

impl Job {
    /// Name of the job kind, for logs
    pub fn name(&self) -> &'static str {
        match &self.kind {
            JobKind::StartDynamicSource => "StartDynamicSource",
            JobKind::SwitchDynamicSource { .. } => "SwitchDynamicSource",
            JobKind::StopOutput { .. } => "StopOutput",
            JobKind::RemoveSource { .. } => "RemoveSource",
            JobKind::HealthProbe { .. } => "HealthProbe",
        }
    }

    /// True if the job issues requests to the composer.
    /// Those are rate limited.
    pub fn touches_composer(&self) -> bool {
        !matches!(self.kind, JobKind::HealthProbe { .. })
    }
}

/// Handle to enqueue jobs. Enqueueing never blocks.
#[derive(Clone)]
pub struct JobSender {
    sender: UnboundedSender<Job>,
    min_delay_ms: Arc<AtomicU64>,
}

/// Creates the job queue
///
/// # Arguments
///
/// * `min_delay` - Initial min delay between composer jobs
pub fn job_channel(min_delay: Duration) -> (JobSender, UnboundedReceiver<Job>) {
    let (sender, receiver) = mpsc::unbounded_channel();

    (
        JobSender {
            sender,
            min_delay_ms: Arc::new(AtomicU64::new(min_delay.as_millis() as u64)),
        },
        receiver,
    )
}

impl JobSender {
    /// Enqueues a job
    ///
    /// Returns false if the dispatcher is gone
    pub fn enqueue(&self, kind: JobKind, target: Option<&str>) -> bool {
        self.sender
            .send(Job {
                kind,
                target: target.map(|t| t.to_string()),
                enqueued_at: Instant::now(),
            })
            .is_ok()
    }

    /// Min delay between composer jobs
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms.load(Ordering::Relaxed))
    }

    /// Changes the min delay between composer jobs
    pub fn set_min_delay(&self, delay: Duration) {
        self.min_delay_ms
            .store(delay.as_millis() as u64, Ordering::Relaxed);
    }

    /// Weak handle, not keeping the queue open
    pub fn downgrade(&self) -> WeakJobSender {
        WeakJobSender {
            sender: self.sender.downgrade(),
            min_delay_ms: self.min_delay_ms.clone(),
        }
    }
}

/// Weak handle to the job queue, used by the dispatcher to enqueue follow-up jobs
#[derive(Clone)]
pub struct WeakJobSender {
    sender: mpsc::WeakUnboundedSender<Job>,
    min_delay_ms: Arc<AtomicU64>,
}

impl WeakJobSender {
    /// Min delay between composer jobs
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms.load(Ordering::Relaxed))
    }

    /// Enqueues a job, if the queue is still open
    pub fn enqueue(&self, kind: JobKind, target: Option<&str>) -> bool {
        match self.sender.upgrade() {
            Some(sender) => sender
                .send(Job {
                    kind,
                    target: target.map(|t| t.to_string()),
                    enqueued_at: Instant::now(),
                })
                .is_ok(),
            None => false,
        }
    }
}
