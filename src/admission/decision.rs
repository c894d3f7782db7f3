// Admission decisions

use std::fmt;

/// Answer to a publish request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishDecision {
    /// The publisher is the lead, its stream goes to the output
    Forward,

    /// The publisher waits in the queue
    EnqueueOnly,

    /// The publisher is refused
    Reject,
}

impl PublishDecision {
    /// True if the ingest server should accept the publisher
    pub fn is_accepted(&self) -> bool {
        !matches!(self, PublishDecision::Reject)
    }
}

/// Why a lead is being evicted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// The output stayed unreachable for too long
    Health,

    /// Requested by an operator
    Operator,
}

impl fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionReason::Health => write!(f, "health"),
            EvictionReason::Operator => write!(f, "operator"),
        }
    }
}

/// What happened after the lead left the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Promotion {
    /// A switch to the new lead was enqueued
    Switch(String),

    /// The queue is empty, a stop was enqueued
    Stop,

    /// Another switch holds the guard. It reconciles when done.
    Deferred,
}
