//! Read-through access to the live configuration.
//!
//! Executors ask the provider for settings on every invocation instead of
//! caching them, so a reload takes effect on the next call.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::schema::{CommandSettings, EdgeConfig, PoolSettings};

/// Per-key settings lookup consulted on each execution.
pub trait ConfigProvider: Send + Sync {
    /// Timeout and breaker settings for a command key.
    fn command(&self, command_key: &str) -> CommandSettings;

    /// Isolation limits for a pool key.
    fn pool(&self, pool_key: &str) -> PoolSettings;
}

/// The live configuration, swapped atomically on reload.
#[derive(Debug)]
pub struct DynamicConfig {
    current: ArcSwap<EdgeConfig>,
}

impl DynamicConfig {
    pub fn new(config: EdgeConfig) -> Self {
        Self {
            current: ArcSwap::from_pointee(config),
        }
    }

    /// The configuration as of now.
    pub fn snapshot(&self) -> Arc<EdgeConfig> {
        self.current.load_full()
    }

    /// Replace the configuration. Callers validate before storing.
    pub fn store(&self, config: EdgeConfig) {
        self.current.store(Arc::new(config));
        tracing::info!("Configuration updated");
    }
}

impl Default for DynamicConfig {
    fn default() -> Self {
        Self::new(EdgeConfig::default())
    }
}

impl ConfigProvider for DynamicConfig {
    fn command(&self, command_key: &str) -> CommandSettings {
        self.current.load().commands.resolve(command_key)
    }

    fn pool(&self, pool_key: &str) -> PoolSettings {
        self.current.load().pools.resolve(pool_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::CommandOverride;

    #[test]
    fn test_store_is_visible_to_next_read() {
        let provider = DynamicConfig::default();
        assert_eq!(provider.command("cmd").timeout_ms, 1000);

        let mut config = EdgeConfig::default();
        config.commands.overrides.insert(
            "cmd".into(),
            CommandOverride {
                timeout_ms: Some(50),
                ..Default::default()
            },
        );
        provider.store(config);

        assert_eq!(provider.command("cmd").timeout_ms, 50);
        assert_eq!(provider.command("other").timeout_ms, 1000);
    }
}
