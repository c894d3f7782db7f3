// Health tracking state

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::time::Instant;

/// Failure tracking for the current lead
#[derive(Debug, Default)]
pub struct HealthState {
    /// Lead being watched
    pub lead: Option<String>,

    /// Start of the current failure streak
    pub first_failure_at: Option<Instant>,

    /// True while a probe job has not reported back
    pub probe_in_flight: bool,
}

impl HealthState {
    /// Creates new HealthState for a lead
    pub fn new(lead: Option<String>) -> HealthState {
        HealthState {
            lead,
            first_failure_at: None,
            probe_in_flight: false,
        }
    }

    /// Starts watching another lead, forgetting the failure streak.
    ///
    /// A probe still in flight keeps its flag: its report is discarded
    /// when it arrives.
    pub fn reset(&mut self, lead: Option<String>) {
        self.lead = lead;
        self.first_failure_at = None;
    }

    /// Records a probe failure
    ///
    /// Returns for how long the output has been failing
    pub fn record_failure(&mut self, now: Instant) -> Duration {
        let first = *self.first_failure_at.get_or_insert(now);
        now - first
    }

    /// Records a probe success
    ///
    /// Returns true if a failure streak ended
    pub fn record_success(&mut self) -> bool {
        self.first_failure_at.take().is_some()
    }
}

/// Failure threshold, adjustable at runtime
#[derive(Clone)]
pub struct HealthThreshold {
    millis: Arc<AtomicU64>,
}

impl HealthThreshold {
    pub fn new(threshold: Duration) -> HealthThreshold {
        HealthThreshold {
            millis: Arc::new(AtomicU64::new(threshold.as_millis() as u64)),
        }
    }

    /// Gets the threshold
    pub fn get(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::Relaxed))
    }

    /// Sets the threshold
    pub fn set(&self, threshold: Duration) {
        self.millis
            .store(threshold.as_millis() as u64, Ordering::Relaxed);
    }
}
