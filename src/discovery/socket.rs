use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tokio::net::UdpSocket;

#[derive(Debug, Error)]
pub enum SocketError {
    #[error("{0} is not a multicast address")]
    NotMulticast(Ipv4Addr),

    #[error("Error setting up bare socket")]
    Construct(io::Error),

    #[error("Error not set Reuse flag on the socket")]
    SetReuse(io::Error),

    #[error("Error not set NonBlocking flag on the socket")]
    SetNonBlocking(io::Error),

    #[error("Error binding to socket")]
    Bind(io::Error),

    #[error("Error joining multicast network")]
    JoinMulticast(io::Error),

    #[error("Error not set multicast Loop flag on the socket")]
    SetLoop(io::Error),

    #[error("Error not set multicast Interface on the socket")]
    SetInterface(io::Error),

    #[error("Error transforming to async socket")]
    ToTokio(io::Error),
}

/// Builds the responder's receive socket: bound to `port` on all
/// interfaces, joined to `group` via `interface`, with the reuse flag set
/// so several listeners can share the port on one host.
pub fn multicast_listener(
    group: Ipv4Addr,
    port: u16,
    interface: Ipv4Addr,
) -> Result<UdpSocket, SocketError> {
    if !group.is_multicast() {
        return Err(SocketError::NotMulticast(group));
    }

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(SocketError::Construct)?;
    socket
        .set_reuse_address(true)
        .map_err(SocketError::SetReuse)?;
    socket
        .set_nonblocking(true)
        .map_err(SocketError::SetNonBlocking)?;

    let bind_addr = SocketAddr::from(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
    socket.bind(&bind_addr.into()).map_err(SocketError::Bind)?;
    socket
        .join_multicast_v4(&group, &interface)
        .map_err(SocketError::JoinMulticast)?;
    socket
        .set_multicast_loop_v4(true)
        .map_err(SocketError::SetLoop)?;

    UdpSocket::from_std(socket.into()).map_err(SocketError::ToTokio)
}

/// Builds a requester's send socket on an ephemeral port. When `interface`
/// is specified, multicast transmissions are pinned to it.
pub fn multicast_sender(interface: Ipv4Addr) -> Result<UdpSocket, SocketError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(SocketError::Construct)?;
    socket
        .set_nonblocking(true)
        .map_err(SocketError::SetNonBlocking)?;

    let bind_addr = SocketAddr::from(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));
    socket.bind(&bind_addr.into()).map_err(SocketError::Bind)?;
    socket
        .set_multicast_loop_v4(true)
        .map_err(SocketError::SetLoop)?;
    if !interface.is_unspecified() {
        socket
            .set_multicast_if_v4(&interface)
            .map_err(SocketError::SetInterface)?;
    }

    UdpSocket::from_std(socket.into()).map_err(SocketError::ToTokio)
}
