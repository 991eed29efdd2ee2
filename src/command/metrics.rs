//! Per-command event counters and snapshots.
//!
//! Counters are cumulative for the process lifetime. The breaker's rolling
//! window is separate and only drives tripping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, UNIX_EPOCH};

use serde::Serialize;

use crate::command::CommandKeys;
use crate::observability::metrics;
use crate::resilience::{CircuitState, HealthCounts, Outcome};

#[derive(Debug)]
pub struct CommandMetrics {
    keys: CommandKeys,
    success: AtomicU64,
    failure: AtomicU64,
    timeout: AtomicU64,
    rejected: AtomicU64,
    short_circuited: AtomicU64,
    fallback_success: AtomicU64,
    fallback_failure: AtomicU64,
}

impl CommandMetrics {
    pub fn new(keys: CommandKeys) -> Self {
        Self {
            keys,
            success: AtomicU64::new(0),
            failure: AtomicU64::new(0),
            timeout: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            short_circuited: AtomicU64::new(0),
            fallback_success: AtomicU64::new(0),
            fallback_failure: AtomicU64::new(0),
        }
    }

    pub fn keys(&self) -> &CommandKeys {
        &self.keys
    }

    pub fn record(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Success => &self.success,
            Outcome::Failure => &self.failure,
            Outcome::Timeout => &self.timeout,
            Outcome::Rejected => &self.rejected,
            Outcome::ShortCircuited => &self.short_circuited,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::record_command_event(self.keys.command(), outcome);
    }

    pub fn record_fallback(&self, succeeded: bool) {
        let counter = if succeeded {
            &self.fallback_success
        } else {
            &self.fallback_failure
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::record_fallback(self.keys.command(), succeeded);
    }

    pub fn record_latency(&self, elapsed: Duration) {
        metrics::record_command_latency(self.keys.command(), elapsed);
    }

    pub fn counts(&self) -> EventCounts {
        EventCounts {
            success_count: self.success.load(Ordering::Relaxed),
            failure_count: self.failure.load(Ordering::Relaxed),
            timeout_count: self.timeout.load(Ordering::Relaxed),
            rejected_count: self.rejected.load(Ordering::Relaxed),
            short_circuited_count: self.short_circuited.load(Ordering::Relaxed),
            fallback_success_count: self.fallback_success.load(Ordering::Relaxed),
            fallback_failure_count: self.fallback_failure.load(Ordering::Relaxed),
        }
    }
}

/// Cumulative counters for one command key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventCounts {
    pub success_count: u64,
    pub failure_count: u64,
    pub timeout_count: u64,
    pub rejected_count: u64,
    pub short_circuited_count: u64,
    pub fallback_success_count: u64,
    pub fallback_failure_count: u64,
}

/// Point-in-time view of one command, as served on the admin surface.
#[derive(Debug, Clone, Serialize)]
pub struct CommandSnapshot {
    pub command_key: String,
    pub group_key: String,
    pub pool_key: String,
    #[serde(flatten)]
    pub counts: EventCounts,
    pub current_state: CircuitState,
    /// Milliseconds since the Unix epoch.
    pub last_state_change_ms: u64,
    pub rolling: HealthCounts,
    pub pool_active: usize,
    pub pool_queued: usize,
}

pub(crate) fn epoch_millis(at: std::time::SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
