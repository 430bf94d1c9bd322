use thiserror::Error;

pub mod locator;
pub mod message;
pub mod responder;
pub mod socket;

pub use locator::{Locator, LocatorConfig};
pub use message::{
    DiscoveryMessage, ServiceRef, DEFAULT_GROUP, DEFAULT_PORT, MAX_DATAGRAM_SIZE,
};
pub use responder::{DiscoveryResponder, ResponderConfig};
pub use socket::{multicast_listener, multicast_sender, SocketError};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Socket setup failed: {0}")]
    Socket(#[from] SocketError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] bincode::Error),

    #[error("No reply after {attempts} lookup attempts")]
    NoReply { attempts: u32 },

    #[error("Responder already active")]
    AlreadyActive,

    #[error("Responder not bound")]
    NotBound,

    #[error("Responder task failed: {0}")]
    TaskFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
