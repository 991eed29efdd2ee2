//! Circuit breaker for command protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls short-circuit to the fallback
//! - Half-Open: one probe call tests whether the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: volume >= threshold AND error % >= threshold over the window
//! Open → Half-Open: sleep window elapsed; the observing call becomes the probe
//! Half-Open → Closed: probe succeeds (window cleared)
//! Half-Open → Open: probe fails, times out, is rejected or is abandoned
//! ```
//!
//! One breaker per command key. Its state sits behind a mutex owned by that
//! key alone; nothing here locks across keys.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::BreakerSettings;
use crate::observability::metrics;
use crate::resilience::rolling::{HealthCounts, Outcome, RollingWindow};

/// Breaker phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    window: RollingWindow,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
    last_transition: SystemTime,
}

/// Per command key circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    key: String,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        tracing::debug!(command = %key, "Circuit breaker created");
        Self {
            key,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                window: RollingWindow::new(),
                opened_at: None,
                probe_in_flight: false,
                last_transition: SystemTime::now(),
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Wall-clock time of the last phase change (creation counts).
    pub fn last_transition(&self) -> SystemTime {
        self.inner.lock().last_transition
    }

    /// Window totals right now.
    pub fn health(&self, settings: &BreakerSettings) -> HealthCounts {
        let mut inner = self.inner.lock();
        inner.window.health(
            Instant::now(),
            settings.bucket_width(),
            settings.rolling_window_buckets,
        )
    }

    /// Gate a call. `None` means short-circuit: do not run the command.
    pub fn try_acquire(self: &Arc<Self>, settings: &BreakerSettings) -> Option<CallPermit> {
        if settings.force_open {
            return None;
        }
        if !settings.enabled || settings.force_closed {
            return Some(self.permit(false));
        }

        let now = Instant::now();
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Some(self.permit(false)),
            CircuitState::Open => {
                let slept = inner
                    .opened_at
                    .map_or(true, |at| now.saturating_duration_since(at) >= settings.sleep_window());
                if slept && !inner.probe_in_flight {
                    self.transition(&mut inner, CircuitState::HalfOpen);
                    inner.probe_in_flight = true;
                    Some(self.permit(true))
                } else {
                    None
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    None
                } else {
                    inner.probe_in_flight = true;
                    Some(self.permit(true))
                }
            }
        }
    }

    fn permit(self: &Arc<Self>, probe: bool) -> CallPermit {
        CallPermit {
            breaker: Arc::clone(self),
            probe,
            settled: false,
        }
    }

    fn on_outcome(&self, outcome: Outcome, probe: bool, settings: &BreakerSettings) {
        let now = Instant::now();
        let width = settings.bucket_width();
        let buckets = settings.rolling_window_buckets;
        let mut inner = self.inner.lock();
        inner.window.record(outcome, now, width, buckets);

        if probe {
            inner.probe_in_flight = false;
            if outcome == Outcome::Success {
                inner.window.reset();
                inner.opened_at = None;
                self.transition(&mut inner, CircuitState::Closed);
            } else {
                inner.opened_at = Some(now);
                self.transition(&mut inner, CircuitState::Open);
            }
            return;
        }

        if inner.state != CircuitState::Closed || !settings.enabled || settings.force_closed {
            return;
        }

        let health = inner.window.health(now, width, buckets);
        if health.total >= settings.request_volume_threshold
            && health.error_percentage() >= u64::from(settings.error_threshold_percentage)
        {
            tracing::warn!(
                command = %self.key,
                total = health.total,
                errors = health.errors,
                error_percentage = health.error_percentage(),
                "Error threshold exceeded"
            );
            inner.opened_at = Some(now);
            self.transition(&mut inner, CircuitState::Open);
        }
    }

    fn abandon_probe(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen && inner.probe_in_flight {
            inner.probe_in_flight = false;
            inner.opened_at = Some(Instant::now());
            tracing::warn!(command = %self.key, "Probe abandoned before completion");
            self.transition(&mut inner, CircuitState::Open);
        }
    }

    fn transition(&self, inner: &mut BreakerInner, to: CircuitState) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;
        inner.last_transition = SystemTime::now();
        match to {
            CircuitState::Open => {
                tracing::warn!(command = %self.key, from = %from, "Circuit breaker opened")
            }
            CircuitState::HalfOpen => {
                tracing::info!(command = %self.key, "Circuit breaker half-open, admitting probe")
            }
            CircuitState::Closed => {
                tracing::info!(command = %self.key, "Circuit breaker closed")
            }
        }
        metrics::record_circuit_state(&self.key, to);
    }
}

/// Admission through the breaker. Report the outcome with [`CallPermit::record`].
///
/// A probe permit dropped without a recorded outcome re-opens the breaker,
/// so a cancelled caller cannot leave it stuck half-open.
#[derive(Debug)]
pub struct CallPermit {
    breaker: Arc<CircuitBreaker>,
    probe: bool,
    settled: bool,
}

impl CallPermit {
    /// Whether this call is the half-open probe.
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn record(mut self, outcome: Outcome, settings: &BreakerSettings) {
        self.settled = true;
        self.breaker.on_outcome(outcome, self.probe, settings);
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if self.probe && !self.settled {
            self.breaker.abandon_probe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings() -> BreakerSettings {
        BreakerSettings {
            request_volume_threshold: 4,
            error_threshold_percentage: 50,
            sleep_window_ms: 1000,
            ..BreakerSettings::default()
        }
    }

    fn feed(breaker: &Arc<CircuitBreaker>, outcome: Outcome, n: usize, s: &BreakerSettings) {
        for _ in 0..n {
            breaker.try_acquire(s).unwrap().record(outcome, s);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_volume_threshold_guards_tripping() {
        let s = settings();
        let breaker = Arc::new(CircuitBreaker::new("cmd"));
        feed(&breaker, Outcome::Failure, 3, &s);
        assert_eq!(breaker.state(), CircuitState::Closed);
        feed(&breaker, Outcome::Failure, 1, &s);
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.try_acquire(&s).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_percentage_below_threshold_stays_closed() {
        let s = settings();
        let breaker = Arc::new(CircuitBreaker::new("cmd"));
        feed(&breaker, Outcome::Success, 6, &s);
        feed(&breaker, Outcome::Timeout, 5, &s);
        assert_eq!(breaker.state(), CircuitState::Closed);
        feed(&breaker, Outcome::Rejected, 1, &s);
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_probe_after_sleep_window() {
        let s = settings();
        let breaker = Arc::new(CircuitBreaker::new("cmd"));
        feed(&breaker, Outcome::Failure, 4, &s);

        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(breaker.try_acquire(&s).is_none());

        tokio::time::advance(Duration::from_millis(1)).await;
        let probe = breaker.try_acquire(&s).unwrap();
        assert!(probe.is_probe());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.try_acquire(&s).is_none());

        probe.record(Outcome::Success, &s);
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.health(&s).total, 0);
        assert!(!breaker.try_acquire(&s).unwrap().is_probe());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_probe_restarts_sleep_window() {
        let s = settings();
        let breaker = Arc::new(CircuitBreaker::new("cmd"));
        feed(&breaker, Outcome::Failure, 4, &s);

        tokio::time::advance(Duration::from_millis(1000)).await;
        breaker.try_acquire(&s).unwrap().record(Outcome::Timeout, &s);
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(breaker.try_acquire(&s).is_none());
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(breaker.try_acquire(&s).unwrap().is_probe());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_probe_reopens() {
        let s = settings();
        let breaker = Arc::new(CircuitBreaker::new("cmd"));
        feed(&breaker, Outcome::Failure, 4, &s);
        tokio::time::advance(Duration::from_millis(1000)).await;

        drop(breaker.try_acquire(&s).unwrap());
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.try_acquire(&s).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_switches() {
        let breaker = Arc::new(CircuitBreaker::new("cmd"));

        let open = BreakerSettings {
            force_open: true,
            ..settings()
        };
        assert!(breaker.try_acquire(&open).is_none());

        let closed = BreakerSettings {
            force_closed: true,
            ..settings()
        };
        feed(&breaker, Outcome::Failure, 10, &closed);
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.try_acquire(&closed).is_some());
    }
}
