use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};

use crate::identity::Identity;

/// Well-known rendezvous group and port.
pub const DEFAULT_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 1, 1);
pub const DEFAULT_PORT: u16 = 10000;

/// Datagrams larger than this are dropped as malformed.
pub const MAX_DATAGRAM_SIZE: usize = 1024;

/// Serialized reference to a live service: where to dial and which identity
/// to address. The address may carry an unspecified IP, in which case the
/// locator substitutes the announce datagram's source IP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRef {
    pub addr: SocketAddr,
    pub identity: Identity,
}

/// Rendezvous datagrams. A requester multicasts `Lookup`; the responder
/// answers over unicast with `Announce`, echoing the requester's `seq`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscoveryMessage {
    Lookup { seq: u64 },
    Announce { seq: u64, service: ServiceRef },
}

impl DiscoveryMessage {
    pub fn serialize(&self) -> Result<Vec<u8>, Box<bincode::ErrorKind>> {
        bincode::serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, Box<bincode::ErrorKind>> {
        bincode::deserialize(bytes)
    }
}
