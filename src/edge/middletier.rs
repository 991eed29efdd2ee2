//! The middle-tier GET command.

use std::sync::Arc;

use crate::command::{BoxError, Command, CommandKeys, EmptyKey};
use crate::load_balancer::{EdgeRequest, LoadBalancedClient};

pub const MIDDLETIER_GROUP: &str = "MiddleTierGroup";
pub const MIDDLETIER_COMMAND: &str = "MiddleTierCommand";
pub const MIDDLETIER_POOL: &str = "MiddleTierPool";
pub const MIDDLETIER_GET_PATH: &str = "/middletier/v1/get";

/// Served whenever the middle tier cannot answer.
pub const FALLBACK_TEXT: &str = "Fraggle Fallback!";

#[derive(Debug, thiserror::Error)]
pub enum MiddleTierError {
    #[error("middle tier {endpoint} answered {status}")]
    Status { endpoint: String, status: u16 },
    #[error("middle tier response is not UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

pub fn middletier_keys() -> Result<CommandKeys, EmptyKey> {
    CommandKeys::new(MIDDLETIER_GROUP, MIDDLETIER_COMMAND, MIDDLETIER_POOL)
}

/// Fetches the middle tier's text through the load-balanced client.
pub struct MiddleTierCommand {
    keys: CommandKeys,
    client: Arc<LoadBalancedClient>,
}

impl MiddleTierCommand {
    pub fn new(keys: CommandKeys, client: Arc<LoadBalancedClient>) -> Self {
        Self { keys, client }
    }
}

impl Command for MiddleTierCommand {
    type Output = String;

    fn keys(&self) -> &CommandKeys {
        &self.keys
    }

    async fn run(&self) -> Result<String, BoxError> {
        let res = self.client.call(EdgeRequest::get(MIDDLETIER_GET_PATH)).await?;
        if !res.status.is_success() {
            return Err(MiddleTierError::Status {
                endpoint: res.endpoint,
                status: res.status.as_u16(),
            }
            .into());
        }
        Ok(String::from_utf8(res.body.to_vec()).map_err(MiddleTierError::from)?)
    }

    async fn fallback(&self) -> Result<String, BoxError> {
        Ok(FALLBACK_TEXT.to_string())
    }
}
