//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → EdgeConfig (validated, immutable)
//!     → provider.rs (DynamicConfig, read per execution)
//!
//! On reload signal:
//!     watcher.rs detects change (or SIGHUP)
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap inside DynamicConfig
//!     → next execution sees new timeouts/thresholds
//! ```

pub mod loader;
pub mod provider;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use provider::{ConfigProvider, DynamicConfig};
pub use schema::{
    BalancingRule, BreakerSettings, ClientConfig, CommandSettings, DirectoryConfig, DirectoryKind,
    EdgeConfig, EndpointConfig, HealthCheckConfig, ObservabilityConfig, PoolSettings,
};
