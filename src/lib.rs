use std::time::Duration;

pub mod app;
pub mod client;
pub mod config;
pub mod discovery;
pub mod endpoint;
pub mod error;
pub mod greeting;
pub mod identity;
pub mod registry;
pub mod wire;

pub use app::{shutdown_signal, App, AppError};
pub use client::Client;
pub use config::{
    ClientSettings, DiscoverySettings, GreetingSettings, Settings, ShutdownSettings,
};
pub use discovery::{
    DiscoveryError, DiscoveryMessage, DiscoveryResponder, Locator, LocatorConfig, ResponderConfig,
    ServiceRef, SocketError, DEFAULT_GROUP, DEFAULT_PORT, MAX_DATAGRAM_SIZE,
};
pub use endpoint::{Endpoint, EndpointConfig, DEFAULT_DRAIN_TIMEOUT};
pub use error::RpcError;
pub use greeting::{GreetReply, Greeter, GreetingClient, GREET_OPERATION};
pub use identity::Identity;
pub use registry::{Handler, HandlerRegistry, SharedHandlerRegistry};
pub use wire::{read_frame, write_frame, Reply, Request, MAX_FRAME_SIZE};

#[cfg(not(test))]
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[cfg(test)]
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
