//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build clients, registry, executor
//!     → Prime server lists → Spawn refreshers + health monitor → Listen
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → background loops exit → server drains
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Trigger config reload
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when server lists are primed)
//! - Reload only touches what is read per call; listener and client wiring
//!   stay as started

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{EdgeApp, StartupError};
