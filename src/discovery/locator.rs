use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::debug;
use uuid::Uuid;

use crate::discovery::message::{
    DiscoveryMessage, ServiceRef, DEFAULT_GROUP, DEFAULT_PORT, MAX_DATAGRAM_SIZE,
};
use crate::discovery::socket::multicast_sender;
use crate::discovery::DiscoveryError;

#[derive(Debug, Clone)]
pub struct LocatorConfig {
    pub group: Ipv4Addr,

    pub port: u16,

    pub interface: Ipv4Addr,

    pub attempts: u32,

    pub timeout: Duration,
}

impl LocatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, group: Ipv4Addr) -> Self {
        self.group = group;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_interface(mut self, interface: Ipv4Addr) -> Self {
        self.interface = interface;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            group: DEFAULT_GROUP,
            port: DEFAULT_PORT,
            interface: Ipv4Addr::UNSPECIFIED,
            attempts: 3,
            timeout: Duration::from_secs(1),
        }
    }
}

/// Client-side rendezvous: multicasts a lookup and waits for the matching
/// unicast announce, with a bounded attempt budget.
pub struct Locator {
    config: LocatorConfig,
}

impl Locator {
    pub fn new(config: LocatorConfig) -> Self {
        Self { config }
    }

    pub async fn locate(&self) -> Result<ServiceRef, DiscoveryError> {
        let socket = multicast_sender(self.config.interface)?;
        let target = SocketAddr::from((self.config.group, self.config.port));
        let seq = Uuid::new_v4().as_u128() as u64;
        let lookup = DiscoveryMessage::Lookup { seq }.serialize()?;

        for attempt in 1..=self.config.attempts {
            socket.send_to(&lookup, target).await?;
            debug!(attempt, seq, "sent lookup to {}", target);

            match timeout(self.config.timeout, await_announce(&socket, seq)).await {
                Ok(result) => return result,
                Err(_) => debug!(attempt, "lookup attempt timed out"),
            }
        }

        Err(DiscoveryError::NoReply {
            attempts: self.config.attempts,
        })
    }
}

async fn await_announce(socket: &UdpSocket, seq: u64) -> Result<ServiceRef, DiscoveryError> {
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];

    loop {
        let (len, from) = socket.recv_from(&mut buf).await?;
        let message = match DiscoveryMessage::deserialize(&buf[..len]) {
            Ok(message) => message,
            Err(_) => continue,
        };

        match message {
            DiscoveryMessage::Announce {
                seq: reply_seq,
                service,
            } if reply_seq == seq => {
                debug!(peer = %from, "received announce for {}", service.addr);
                return Ok(resolve_advertised(service, from));
            }
            _ => continue,
        }
    }
}

/// An announced reference may advertise an unspecified IP; the announce
/// datagram's source IP stands in for it so the reference stays dialable
/// from the requester's side of the network.
fn resolve_advertised(mut service: ServiceRef, from: SocketAddr) -> ServiceRef {
    if service.addr.ip().is_unspecified() {
        let mut addr = from;
        addr.set_port(service.addr.port());
        service.addr = addr;
    }
    service
}
