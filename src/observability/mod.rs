//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms via the metrics facade)
//!
//! Consumers:
//!     → stdout log lines
//!     → Prometheus scrape endpoint
//!     → /admin/commands JSON snapshot (built from command::metrics)
//! ```

pub mod logging;
pub mod metrics;
