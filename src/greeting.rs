use std::net::SocketAddr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::Client;
use crate::error::RpcError;
use crate::identity::Identity;
use crate::registry::Handler;

/// The one operation the greeting service exposes. It takes no parameters.
pub const GREET_OPERATION: &str = "greet";

/// Payload returned by a `greet` call.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GreetReply {
    pub message: String,
}

/// Stateless greeting handler. Every `greet` call returns the same
/// configured message.
pub struct Greeter {
    message: String,
}

impl Greeter {
    pub fn new() -> Self {
        Self::with_message("Hello World!")
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Default for Greeter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for Greeter {
    async fn handle(&self, operation: &str, _params: &[u8]) -> Result<Vec<u8>, RpcError> {
        match operation {
            GREET_OPERATION => {
                debug!("👋 serving greet");
                let reply = GreetReply {
                    message: self.message.clone(),
                };
                Ok(bincode::serialize(&reply)?)
            }
            other => Err(RpcError::UnknownOperation(other.to_string())),
        }
    }
}

/// Typed client wrapper for the greeting service.
pub struct GreetingClient {
    client: Client,
    identity: Identity,
}

impl GreetingClient {
    pub async fn connect(addr: SocketAddr, identity: Identity) -> Result<Self, RpcError> {
        let client = Client::connect(addr).await?;
        Ok(Self { client, identity })
    }

    pub async fn greet(&self) -> Result<String, RpcError> {
        let data = self
            .client
            .invoke(&self.identity, GREET_OPERATION, Vec::new())
            .await?;
        let reply: GreetReply = bincode::deserialize(&data)?;
        Ok(reply.message)
    }
}
