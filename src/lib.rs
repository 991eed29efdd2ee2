//! flux-edge library: resilient command execution, load-balanced middle-tier
//! access and the edge HTTP surface built on them.

pub mod admin;
pub mod command;
pub mod config;
pub mod directory;
pub mod edge;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod resilience;

pub use command::{Command, CommandExecutor, CommandKeys, CommandRegistry, ExecutionError};
pub use config::{DynamicConfig, EdgeConfig};
pub use http::EdgeServer;
pub use lifecycle::{EdgeApp, Shutdown};
