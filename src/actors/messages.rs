//! Message types for the monitoring scheduler
//!
//! Cycle results are typed rather than logged-and-forgotten: a cycle that
//! does no work reports *why* (no rules, no channels, no budget), so both
//! callers and tests can assert on the reason instead of scraping logs.

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

/// Commands that can be sent to a MonitorActor
#[derive(Debug)]
pub enum MonitorCommand {
    /// Run one cycle immediately, bypassing the interval timer.
    ///
    /// Used for manual refreshes and tests.
    RunNow {
        /// Channel to send the cycle report back
        respond_to: oneshot::Sender<CycleReport>,
    },

    /// Update the cycle interval.
    UpdateInterval { interval_minutes: u64 },

    /// Gracefully shut down the actor.
    ///
    /// An in-flight cycle runs to completion; the shutdown takes effect
    /// before the next one.
    Shutdown,
}

/// Outcome of one monitoring cycle for one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub owner: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: CycleOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The full pipeline ran.
    Completed {
        /// De-duplicated channels fetched this cycle
        channels: usize,

        /// Fresh observations returned by the feed
        observations: usize,

        /// Alerts produced by rule evaluation
        alerts_evaluated: usize,

        /// Alerts actually stored after de-duplication
        alerts_persisted: usize,
    },

    /// The cycle ended early with no work performed. Expected condition,
    /// retried on the next tick.
    Skipped(SkipReason),

    /// A step failed unexpectedly (feed down, storage error). Logged and
    /// retried on the next tick; never propagated out of the actor.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The identity has no active alert rules
    NoActiveRules,

    /// No channels across the identity's monitoring-enabled folders
    NoMonitoredChannels,

    /// The daily quota budget cannot cover the estimated fetch cost
    QuotaExhausted { remaining: u64, required: u64 },
}

impl CycleOutcome {
    /// Alerts stored by this cycle (zero for skips and failures).
    pub fn alerts_persisted(&self) -> usize {
        match self {
            CycleOutcome::Completed {
                alerts_persisted, ..
            } => *alerts_persisted,
            _ => 0,
        }
    }
}
