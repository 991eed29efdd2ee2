//! Isolation pools.
//!
//! A pool bounds how many executions sharing a pool key run at once, plus
//! how many may wait for a slot. Anything beyond that is rejected
//! immediately, so saturation shows up as backpressure instead of latency.
//! Limits are passed in on each admission so reloaded settings apply to the
//! next call.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::config::PoolSettings;

/// The pool had no slot and no queue space.
#[derive(Debug, Clone, thiserror::Error)]
#[error("isolation pool {0} saturated")]
pub struct PoolSaturated(pub String);

/// Bounded concurrency for one pool key.
#[derive(Debug)]
pub struct IsolationPool {
    key: String,
    active: AtomicUsize,
    queued: AtomicUsize,
    released: Notify,
}

impl IsolationPool {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            active: AtomicUsize::new(0),
            queued: AtomicUsize::new(0),
            released: Notify::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Executions currently holding a slot.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Executions waiting for a slot.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    /// Take a slot now, or a queue position, or fail without waiting.
    pub fn try_admit(self: &Arc<Self>, limits: PoolSettings) -> Result<Admission, PoolSaturated> {
        if self.try_take_slot(limits.max_concurrency) {
            return Ok(Admission::Granted(PoolPermit {
                pool: Arc::clone(self),
            }));
        }

        let mut queued = self.queued.load(Ordering::Acquire);
        loop {
            if queued >= limits.queue_size {
                return Err(PoolSaturated(self.key.clone()));
            }
            match self.queued.compare_exchange_weak(
                queued,
                queued + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(x) => queued = x,
            }
        }

        Ok(Admission::Queued(QueuedAdmission {
            pool: Arc::clone(self),
            limit: limits.max_concurrency,
        }))
    }

    fn try_take_slot(&self, limit: usize) -> bool {
        let mut prev = self.active.load(Ordering::Acquire);
        loop {
            if prev >= limit {
                return false;
            }
            match self.active.compare_exchange_weak(
                prev,
                prev + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(x) => prev = x,
            }
        }
    }

    fn release(&self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
        self.released.notify_one();
    }
}

/// Result of a successful admission.
#[derive(Debug)]
pub enum Admission {
    Granted(PoolPermit),
    Queued(QueuedAdmission),
}

impl Admission {
    /// Wait (if queued) until a slot is held.
    pub async fn ready(self) -> PoolPermit {
        match self {
            Admission::Granted(permit) => permit,
            Admission::Queued(queued) => queued.wait().await,
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, Admission::Queued(_))
    }
}

/// A queue position. Dropping it gives the position back.
#[derive(Debug)]
pub struct QueuedAdmission {
    pool: Arc<IsolationPool>,
    limit: usize,
}

impl QueuedAdmission {
    async fn wait(self) -> PoolPermit {
        loop {
            let notified = self.pool.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pool.try_take_slot(self.limit) {
                break;
            }
            notified.await;
        }
        PoolPermit {
            pool: Arc::clone(&self.pool),
        }
    }
}

impl Drop for QueuedAdmission {
    fn drop(&mut self) {
        self.pool.queued.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A held slot, released on drop.
#[derive(Debug)]
pub struct PoolPermit {
    pool: Arc<IsolationPool>,
}

impl Drop for PoolPermit {
    fn drop(&mut self) {
        self.pool.release();
    }
}
