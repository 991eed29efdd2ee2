//! Command execution subsystem.
//!
//! # Data Flow
//! ```text
//! CommandExecutor::execute(command)
//!     → registry.rs (per-key breaker, pool and metrics, created on first use)
//!     → circuit breaker gate (short-circuit → fallback)
//!     → isolation.rs (slot or bounded queue, else Rejected → fallback)
//!     → run() on a detached task under the command timeout
//!     → outcome → breaker window + metrics.rs
//!     → fallback() on any non-success outcome
//! ```
//!
//! # Design Decisions
//! - One attempt per execution; retries belong to callers
//! - Callers only ever see the run value, the fallback value or FallbackFailed
//! - Settings are read from the ConfigProvider on every execution

pub mod error;
pub mod executor;
pub mod isolation;
pub mod metrics;
pub mod registry;

use std::future::Future;

pub use error::{BoxError, ExecutionError, NoFallback, RejectionReason};
pub use executor::{CommandExecutor, ExecutionReport};
pub use isolation::{Admission, IsolationPool, PoolPermit, PoolSaturated};
pub use metrics::{CommandMetrics, CommandSnapshot, EventCounts};
pub use registry::CommandRegistry;

/// A key was empty when building [`CommandKeys`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0} key must not be empty")]
pub struct EmptyKey(pub &'static str);

/// Group, command and pool keys identifying a command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandKeys {
    group: String,
    command: String,
    pool: String,
}

impl CommandKeys {
    pub fn new(
        group: impl Into<String>,
        command: impl Into<String>,
        pool: impl Into<String>,
    ) -> Result<Self, EmptyKey> {
        let keys = Self {
            group: group.into(),
            command: command.into(),
            pool: pool.into(),
        };
        if keys.group.is_empty() {
            return Err(EmptyKey("group"));
        }
        if keys.command.is_empty() {
            return Err(EmptyKey("command"));
        }
        if keys.pool.is_empty() {
            return Err(EmptyKey("pool"));
        }
        Ok(keys)
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn pool(&self) -> &str {
        &self.pool
    }
}

/// A named unit of isolated, fallback-protected remote work.
///
/// `run()` is executed on its own task and may be abandoned on timeout
/// while still in flight, so it must not perform side effects that assume
/// they will be cancelled.
pub trait Command: Send + Sync + 'static {
    type Output: Send + 'static;

    fn keys(&self) -> &CommandKeys;

    fn run(&self) -> impl Future<Output = Result<Self::Output, BoxError>> + Send;

    /// Value served when `run()` fails, times out, or is not attempted.
    fn fallback(&self) -> impl Future<Output = Result<Self::Output, BoxError>> + Send {
        async { Err(NoFallback.into()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_must_be_non_empty() {
        assert!(CommandKeys::new("g", "c", "p").is_ok());
        assert_eq!(CommandKeys::new("", "c", "p"), Err(EmptyKey("group")));
        assert_eq!(CommandKeys::new("g", "", "p"), Err(EmptyKey("command")));
        assert_eq!(CommandKeys::new("g", "c", ""), Err(EmptyKey("pool")));
    }
}
