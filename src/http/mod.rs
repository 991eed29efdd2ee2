//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, trace/timeout layers)
//!     → request.rs (x-request-id assigned and echoed)
//!     → /service/edge/v1/middletier → MiddleTierCommand via the executor
//!     → /healthcheck
//!     → /admin/* (admin module, bearer auth)
//! ```

pub mod request;
pub mod server;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, EdgeServer};
