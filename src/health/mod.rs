//! Endpoint health checking.
//!
//! # Data Flow
//! ```text
//! Periodic timer (active.rs)
//!     → Probe every endpoint of every server list
//!         - HTTP GET on the configured path, 2xx = pass
//!         - TCP connect when no path is configured
//!     → Endpoint::mark_success / mark_failure (thresholds)
//!     → edge_endpoint_health gauge
//! ```
//!
//! # Design Decisions
//! - Only the monitor changes endpoint health; live call failures do not
//! - State transitions require consecutive successes/failures
//! - Health is independent of any command's circuit breaker

pub mod active;

pub use active::HealthMonitor;
