//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Command execution:
//!     → circuit_breaker.rs (gate: allow, probe or short-circuit)
//!     → timeouts.rs (run detached under the command's deadline)
//!     → rolling.rs (outcome lands in the key's time-bucketed window)
//!     → circuit_breaker.rs (trip or recover based on window health)
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline
//! - No retries; one attempt per execution
//! - Breaker state is per command key, never global

pub mod circuit_breaker;
pub mod rolling;
pub mod timeouts;

pub use circuit_breaker::{CallPermit, CircuitBreaker, CircuitState};
pub use rolling::{HealthCounts, Outcome, RollingWindow};
pub use timeouts::{run_detached, DetachError};
