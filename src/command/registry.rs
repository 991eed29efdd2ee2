//! Per-key state registry.
//!
//! Breakers and metrics are keyed by command key, pools by pool key. Entries
//! are created on first access and never removed, so every caller sharing a
//! key shares the same state for the life of the process.

use std::sync::Arc;

use dashmap::DashMap;

use crate::command::metrics::{epoch_millis, CommandMetrics, CommandSnapshot};
use crate::command::{CommandKeys, IsolationPool};
use crate::config::ConfigProvider;
use crate::resilience::CircuitBreaker;

#[derive(Debug, Default)]
pub struct CommandRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    pools: DashMap<String, Arc<IsolationPool>>,
    metrics: DashMap<String, Arc<CommandMetrics>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn breaker(&self, command_key: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(command_key) {
            return Arc::clone(existing.value());
        }
        self.breakers
            .entry(command_key.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(command_key)))
            .clone()
    }

    pub fn pool(&self, pool_key: &str) -> Arc<IsolationPool> {
        if let Some(existing) = self.pools.get(pool_key) {
            return Arc::clone(existing.value());
        }
        self.pools
            .entry(pool_key.to_string())
            .or_insert_with(|| {
                tracing::debug!(pool = %pool_key, "Isolation pool created");
                Arc::new(IsolationPool::new(pool_key))
            })
            .clone()
    }

    pub fn metrics(&self, keys: &CommandKeys) -> Arc<CommandMetrics> {
        if let Some(existing) = self.metrics.get(keys.command()) {
            return Arc::clone(existing.value());
        }
        self.metrics
            .entry(keys.command().to_string())
            .or_insert_with(|| Arc::new(CommandMetrics::new(keys.clone())))
            .clone()
    }

    /// Snapshots of every command seen so far, sorted by command key.
    pub fn snapshots(&self, config: &dyn ConfigProvider) -> Vec<CommandSnapshot> {
        let all: Vec<Arc<CommandMetrics>> = self.metrics.iter().map(|e| Arc::clone(e.value())).collect();
        let mut snapshots: Vec<CommandSnapshot> = all
            .iter()
            .map(|m| {
                let keys = m.keys();
                let breaker = self.breaker(keys.command());
                let pool = self.pool(keys.pool());
                let settings = config.command(keys.command());
                CommandSnapshot {
                    command_key: keys.command().to_string(),
                    group_key: keys.group().to_string(),
                    pool_key: keys.pool().to_string(),
                    counts: m.counts(),
                    current_state: breaker.state(),
                    last_state_change_ms: epoch_millis(breaker.last_transition()),
                    rolling: breaker.health(&settings.circuit_breaker),
                    pool_active: pool.active(),
                    pool_queued: pool.queued(),
                }
            })
            .collect();
        snapshots.sort_by(|a, b| a.command_key.cmp(&b.command_key));
        snapshots
    }
}
