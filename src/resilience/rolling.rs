//! Time-bucketed rolling outcome window.
//!
//! A fixed number of buckets, each covering a fixed slice of time. Buckets
//! rotate when their slice ends, not per call; the oldest bucket falls off
//! when a new one opens, so memory is bounded by the bucket count.

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// How a single execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Timeout,
    /// The isolation pool had no slot and no queue space.
    Rejected,
    /// The breaker refused the call without running it.
    ShortCircuited,
}

impl Outcome {
    /// Outcomes that count toward the error percentage.
    pub fn is_error(self) -> bool {
        matches!(self, Outcome::Failure | Outcome::Timeout | Outcome::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Timeout => "timeout",
            Outcome::Rejected => "rejected",
            Outcome::ShortCircuited => "short_circuited",
        }
    }
}

/// Totals over the live part of the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HealthCounts {
    pub total: u64,
    pub errors: u64,
}

impl HealthCounts {
    /// Error percentage, 0 when there is no traffic.
    pub fn error_percentage(&self) -> u64 {
        if self.total == 0 {
            0
        } else {
            self.errors * 100 / self.total
        }
    }
}

#[derive(Debug, Clone)]
struct Bucket {
    start: Instant,
    success: u64,
    failure: u64,
    timeout: u64,
    rejected: u64,
}

impl Bucket {
    fn new(start: Instant) -> Self {
        Self {
            start,
            success: 0,
            failure: 0,
            timeout: 0,
            rejected: 0,
        }
    }

    fn errors(&self) -> u64 {
        self.failure + self.timeout + self.rejected
    }
}

/// Rolling window of outcome buckets. Not synchronised; the owner locks it.
#[derive(Debug, Default)]
pub struct RollingWindow {
    buckets: VecDeque<Bucket>,
}

impl RollingWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an outcome to the current bucket. Short-circuits are not counted.
    pub fn record(&mut self, outcome: Outcome, now: Instant, width: Duration, count: u32) {
        if outcome == Outcome::ShortCircuited {
            return;
        }
        self.rotate(now, width, count);
        let Some(bucket) = self.buckets.back_mut() else {
            return;
        };
        match outcome {
            Outcome::Success => bucket.success += 1,
            Outcome::Failure => bucket.failure += 1,
            Outcome::Timeout => bucket.timeout += 1,
            Outcome::Rejected => bucket.rejected += 1,
            Outcome::ShortCircuited => {}
        }
    }

    /// Totals across every bucket still inside the window.
    pub fn health(&mut self, now: Instant, width: Duration, count: u32) -> HealthCounts {
        self.evict(now, width, count);
        self.buckets.iter().fold(HealthCounts::default(), |acc, b| HealthCounts {
            total: acc.total + b.success + b.errors(),
            errors: acc.errors + b.errors(),
        })
    }

    pub fn reset(&mut self) {
        self.buckets.clear();
    }

    /// Number of buckets currently held.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn rotate(&mut self, now: Instant, width: Duration, count: u32) {
        self.evict(now, width, count);
        let current = matches!(
            self.buckets.back(),
            Some(b) if now.saturating_duration_since(b.start) < width
        );
        if !current {
            self.buckets.push_back(Bucket::new(now));
            while self.buckets.len() > count.max(1) as usize {
                self.buckets.pop_front();
            }
        }
    }

    fn evict(&mut self, now: Instant, width: Duration, count: u32) {
        let span = width * count.max(1);
        while let Some(front) = self.buckets.front() {
            if now.saturating_duration_since(front.start) >= span {
                self.buckets.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDTH: Duration = Duration::from_millis(100);

    #[test]
    fn test_counts_within_one_bucket() {
        let mut window = RollingWindow::new();
        let now = Instant::now();
        window.record(Outcome::Success, now, WIDTH, 10);
        window.record(Outcome::Failure, now, WIDTH, 10);
        window.record(Outcome::Timeout, now, WIDTH, 10);
        window.record(Outcome::Rejected, now, WIDTH, 10);
        window.record(Outcome::ShortCircuited, now, WIDTH, 10);

        let health = window.health(now, WIDTH, 10);
        assert_eq!(health, HealthCounts { total: 4, errors: 3 });
        assert_eq!(health.error_percentage(), 75);
        assert_eq!(window.bucket_count(), 1);
    }

    #[test]
    fn test_buckets_rotate_by_time() {
        let mut window = RollingWindow::new();
        let start = Instant::now();
        for i in 0..5u32 {
            window.record(Outcome::Failure, start + WIDTH * i, WIDTH, 3);
        }
        // Only the three most recent slices survive.
        assert_eq!(window.bucket_count(), 3);
        let health = window.health(start + WIDTH * 4, WIDTH, 3);
        assert_eq!(health.total, 3);
    }

    #[test]
    fn test_old_buckets_expire_without_traffic() {
        let mut window = RollingWindow::new();
        let start = Instant::now();
        window.record(Outcome::Failure, start, WIDTH, 10);
        assert_eq!(window.health(start + WIDTH * 9, WIDTH, 10).total, 1);
        assert_eq!(window.health(start + WIDTH * 10, WIDTH, 10).total, 0);
        assert_eq!(window.bucket_count(), 0);
    }

    #[test]
    fn test_error_percentage_without_traffic() {
        assert_eq!(HealthCounts::default().error_percentage(), 0);
    }
}
