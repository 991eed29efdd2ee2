//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the edge
//! service. All types derive Serde traits for deserialization from config
//! files, and every section falls back to its `Default` impl.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Name of the client the middle-tier command calls through.
pub const MIDDLETIER_CLIENT: &str = "middletier-client";

/// Root configuration for the edge service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Listener configuration (bind address, request timeout).
    pub listener: ListenerConfig,

    /// Command timeouts and circuit breaker settings.
    pub commands: CommandsConfig,

    /// Isolation pool limits.
    pub pools: PoolsConfig,

    /// Load-balanced clients keyed by client name.
    pub clients: HashMap<String, ClientConfig>,

    /// Directory (service registry) the clients poll.
    pub directory: DirectoryConfig,

    /// Endpoint health check settings.
    pub health_check: HealthCheckConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin surface settings.
    pub admin: AdminConfig,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        let mut clients = HashMap::new();
        clients.insert(MIDDLETIER_CLIENT.to_string(), ClientConfig::default());
        Self {
            listener: ListenerConfig::default(),
            commands: CommandsConfig::default(),
            pools: PoolsConfig::default(),
            clients,
            directory: DirectoryConfig::default(),
            health_check: HealthCheckConfig::default(),
            observability: ObservabilityConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Upper bound on a whole HTTP request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Command settings: a default plus per command key overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CommandsConfig {
    pub default: CommandSettings,
    pub overrides: HashMap<String, CommandOverride>,
}

impl CommandsConfig {
    /// Effective settings for a command key.
    pub fn resolve(&self, command_key: &str) -> CommandSettings {
        match self.overrides.get(command_key) {
            Some(o) => self.default.merged(o),
            None => self.default.clone(),
        }
    }
}

/// Fully resolved settings for one command key.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CommandSettings {
    /// Execution timeout in milliseconds.
    pub timeout_ms: u64,

    /// Circuit breaker settings.
    pub circuit_breaker: BreakerSettings,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 1000,
            circuit_breaker: BreakerSettings::default(),
        }
    }
}

impl CommandSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn merged(&self, o: &CommandOverride) -> Self {
        let b = &self.circuit_breaker;
        let ob = &o.circuit_breaker;
        Self {
            timeout_ms: o.timeout_ms.unwrap_or(self.timeout_ms),
            circuit_breaker: BreakerSettings {
                enabled: ob.enabled.unwrap_or(b.enabled),
                request_volume_threshold: ob
                    .request_volume_threshold
                    .unwrap_or(b.request_volume_threshold),
                error_threshold_percentage: ob
                    .error_threshold_percentage
                    .unwrap_or(b.error_threshold_percentage),
                sleep_window_ms: ob.sleep_window_ms.unwrap_or(b.sleep_window_ms),
                rolling_window_ms: ob.rolling_window_ms.unwrap_or(b.rolling_window_ms),
                rolling_window_buckets: ob
                    .rolling_window_buckets
                    .unwrap_or(b.rolling_window_buckets),
                force_open: ob.force_open.unwrap_or(b.force_open),
                force_closed: ob.force_closed.unwrap_or(b.force_closed),
            },
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// When false, the breaker never short-circuits and never trips.
    pub enabled: bool,

    /// Minimum requests in the rolling window before the breaker may trip.
    pub request_volume_threshold: u64,

    /// Error percentage (0-100) at or above which the breaker trips.
    pub error_threshold_percentage: u8,

    /// Time spent OPEN before a probe is allowed, in milliseconds.
    pub sleep_window_ms: u64,

    /// Length of the rolling statistics window, in milliseconds.
    pub rolling_window_ms: u64,

    /// Number of buckets the rolling window is divided into.
    pub rolling_window_buckets: u32,

    /// Reject everything regardless of health.
    pub force_open: bool,

    /// Allow everything regardless of health (statistics still tracked).
    pub force_closed: bool,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            request_volume_threshold: 20,
            error_threshold_percentage: 50,
            sleep_window_ms: 5000,
            rolling_window_ms: 10_000,
            rolling_window_buckets: 10,
            force_open: false,
            force_closed: false,
        }
    }
}

impl BreakerSettings {
    pub fn sleep_window(&self) -> Duration {
        Duration::from_millis(self.sleep_window_ms)
    }

    pub fn rolling_window(&self) -> Duration {
        Duration::from_millis(self.rolling_window_ms)
    }

    /// Width of one bucket of the rolling window. Validation requires the
    /// window to divide evenly, so buckets cover it exactly.
    pub fn bucket_width(&self) -> Duration {
        let buckets = u64::from(self.rolling_window_buckets.max(1));
        Duration::from_millis((self.rolling_window_ms / buckets).max(1))
    }
}

/// Partial command settings applied over the defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CommandOverride {
    pub timeout_ms: Option<u64>,
    pub circuit_breaker: BreakerOverride,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerOverride {
    pub enabled: Option<bool>,
    pub request_volume_threshold: Option<u64>,
    pub error_threshold_percentage: Option<u8>,
    pub sleep_window_ms: Option<u64>,
    pub rolling_window_ms: Option<u64>,
    pub rolling_window_buckets: Option<u32>,
    pub force_open: Option<bool>,
    pub force_closed: Option<bool>,
}

/// Isolation pool settings: a default plus per pool key overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolsConfig {
    pub default: PoolSettings,
    pub overrides: HashMap<String, PoolOverride>,
}

impl PoolsConfig {
    /// Effective settings for a pool key.
    pub fn resolve(&self, pool_key: &str) -> PoolSettings {
        match self.overrides.get(pool_key) {
            Some(o) => PoolSettings {
                max_concurrency: o.max_concurrency.unwrap_or(self.default.max_concurrency),
                queue_size: o.queue_size.unwrap_or(self.default.queue_size),
            },
            None => self.default.clone(),
        }
    }
}

/// Limits of one isolation pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Executions allowed to run at once.
    pub max_concurrency: usize,

    /// Executions allowed to wait for a slot. Zero means reject immediately.
    pub queue_size: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            queue_size: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolOverride {
    pub max_concurrency: Option<usize>,
    pub queue_size: Option<usize>,
}

/// Endpoint selection rule for a client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BalancingRule {
    #[default]
    RoundRobin,
    WeightedRoundRobin,
}

/// A load-balanced client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Service name looked up in the directory.
    pub service_name: String,

    /// Endpoint selection rule.
    pub rule: BalancingRule,

    /// Server list refresh interval in seconds.
    pub refresh_interval_secs: u64,

    /// Connection establishment timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Response timeout in milliseconds.
    pub read_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            service_name: "middletier".to_string(),
            rule: BalancingRule::RoundRobin,
            refresh_interval_secs: 30,
            connect_timeout_ms: 2000,
            read_timeout_ms: 5000,
        }
    }
}

/// Which directory implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryKind {
    /// Endpoints listed under `directory.services`.
    #[default]
    Static,
    /// Endpoints fetched from `directory.url`.
    Http,
}

/// Directory (service registry) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub kind: DirectoryKind,

    /// Base URL of the HTTP directory.
    pub url: String,

    /// HTTP directory request timeout in milliseconds.
    pub request_timeout_ms: u64,

    /// Static endpoints keyed by service name.
    pub services: HashMap<String, Vec<EndpointConfig>>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            kind: DirectoryKind::Static,
            url: "http://localhost:8761".to_string(),
            request_timeout_ms: 3000,
            services: HashMap::new(),
        }
    }
}

/// A statically configured endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,

    /// Weight for weighted round-robin (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Health check timeout in milliseconds.
    pub timeout_ms: u64,

    /// HTTP path to probe. Without a path a TCP connect is the probe.
    pub path: Option<String>,

    /// Number of consecutive failures before marking unhealthy.
    pub unhealthy_threshold: u32,

    /// Number of consecutive successes before marking healthy.
    pub healthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            timeout_ms: 2000,
            path: Some("/healthcheck".to_string()),
            unhealthy_threshold: 3,
            healthy_threshold: 2,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin surface configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Bearer token required on `/admin/*`. No token means open access.
    pub api_key: Option<String>,
}
