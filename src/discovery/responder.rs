use std::net::{Ipv4Addr, SocketAddr};

use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::discovery::message::{
    DiscoveryMessage, ServiceRef, DEFAULT_GROUP, DEFAULT_PORT, MAX_DATAGRAM_SIZE,
};
use crate::discovery::socket::multicast_listener;
use crate::discovery::DiscoveryError;

#[derive(Debug, Clone)]
pub struct ResponderConfig {
    pub group: Ipv4Addr,

    pub port: u16,

    pub interface: Ipv4Addr,
}

impl ResponderConfig {
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
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            group: DEFAULT_GROUP,
            port: DEFAULT_PORT,
            interface: Ipv4Addr::UNSPECIFIED,
        }
    }
}

/// Listens on the rendezvous group and answers each well-formed lookup with
/// a unicast announce carrying the service reference. Everything else that
/// arrives on the socket is dropped.
pub struct DiscoveryResponder {
    config: ResponderConfig,
    service: ServiceRef,
    socket: Option<UdpSocket>,
    local_addr: Option<SocketAddr>,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl DiscoveryResponder {
    pub fn new(config: ResponderConfig, service: ServiceRef) -> Self {
        Self {
            config,
            service,
            socket: None,
            local_addr: None,
            shutdown: None,
            task: None,
        }
    }

    /// Binds the group socket. Must run inside a Tokio runtime.
    pub fn bind(&mut self) -> Result<SocketAddr, DiscoveryError> {
        let socket =
            multicast_listener(self.config.group, self.config.port, self.config.interface)?;
        let local_addr = socket.local_addr()?;

        self.socket = Some(socket);
        self.local_addr = Some(local_addr);
        info!(
            "discovery responder bound at {} (group {})",
            local_addr, self.config.group
        );
        Ok(local_addr)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn service(&self) -> &ServiceRef {
        &self.service
    }

    pub fn activate(&mut self) -> Result<(), DiscoveryError> {
        if self.task.is_some() {
            return Err(DiscoveryError::AlreadyActive);
        }
        let socket = self.socket.take().ok_or(DiscoveryError::NotBound)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let service = self.service.clone();
        let task = tokio::spawn(serve(socket, service, shutdown_rx));

        self.shutdown = Some(shutdown_tx);
        self.task = Some(task);
        Ok(())
    }

    pub async fn deactivate(&mut self) -> Result<(), DiscoveryError> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| DiscoveryError::TaskFailed(e.to_string()))?;
            info!("discovery responder stopped");
        }
        Ok(())
    }
}

async fn serve(socket: UdpSocket, service: ServiceRef, mut shutdown: watch::Receiver<bool>) {
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];

    loop {
        let received = tokio::select! {
            _ = shutdown.wait_for(|stop| *stop) => break,
            received = socket.recv_from(&mut buf) => received,
        };

        let (len, peer) = match received {
            Ok(v) => v,
            Err(e) => {
                warn!("lookup receive error: {}", e);
                continue;
            }
        };

        // A lookup that does not decode is nobody's problem but the sender's.
        let message = match DiscoveryMessage::deserialize(&buf[..len]) {
            Ok(message) => message,
            Err(_) => {
                debug!(peer = %peer, "ignoring undecodable datagram");
                continue;
            }
        };

        match message {
            DiscoveryMessage::Lookup { seq } => {
                let announce = DiscoveryMessage::Announce {
                    seq,
                    service: service.clone(),
                };
                match announce.serialize() {
                    Ok(bytes) => {
                        if let Err(e) = socket.send_to(&bytes, peer).await {
                            warn!(peer = %peer, "failed to send announce: {}", e);
                        } else {
                            debug!(peer = %peer, seq, "📢 answered lookup");
                        }
                    }
                    Err(e) => warn!("failed to encode announce: {}", e),
                }
            }
            DiscoveryMessage::Announce { .. } => {
                debug!(peer = %peer, "ignoring unexpected announce");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use std::time::Duration;
    use tokio::time::timeout;

    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    fn test_responder() -> DiscoveryResponder {
        let config = ResponderConfig::new()
            .with_port(0)
            .with_interface("127.0.0.1".parse().unwrap());
        let service = ServiceRef {
            addr: "127.0.0.1:4711".parse().unwrap(),
            identity: Identity::new("greeter-under-test"),
        };
        DiscoveryResponder::new(config, service)
    }

    #[tokio::test]
    async fn test_replies_to_lookup() {
        let mut responder = test_responder();
        let port = responder.bind().unwrap().port();
        responder.activate().unwrap();

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let lookup = DiscoveryMessage::Lookup { seq: 99 }.serialize().unwrap();
        socket
            .send_to(&lookup, ("127.0.0.1", port))
            .await
            .unwrap();

        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let (len, _) = timeout(TEST_TIMEOUT, socket.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();

        let announce = DiscoveryMessage::deserialize(&buf[..len]).unwrap();
        match announce {
            DiscoveryMessage::Announce { seq, service } => {
                assert_eq!(seq, 99);
                assert_eq!(service.identity.as_str(), "greeter-under-test");
            }
            other => panic!("expected announce, got {:?}", other),
        }

        responder.deactivate().await.unwrap();
    }

    #[tokio::test]
    async fn test_activate_requires_bind() {
        let mut responder = test_responder();
        assert!(matches!(
            responder.activate(),
            Err(DiscoveryError::NotBound)
        ));
    }

    #[tokio::test]
    async fn test_activate_twice_is_an_error() {
        let mut responder = test_responder();
        responder.bind().unwrap();
        responder.activate().unwrap();

        assert!(matches!(
            responder.activate(),
            Err(DiscoveryError::AlreadyActive)
        ));

        responder.deactivate().await.unwrap();
    }

    #[tokio::test]
    async fn test_deactivate_stops_answering() {
        let mut responder = test_responder();
        let port = responder.bind().unwrap().port();
        responder.activate().unwrap();
        responder.deactivate().await.unwrap();

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let lookup = DiscoveryMessage::Lookup { seq: 1 }.serialize().unwrap();
        socket
            .send_to(&lookup, ("127.0.0.1", port))
            .await
            .unwrap();

        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let reply = timeout(Duration::from_millis(300), socket.recv_from(&mut buf)).await;
        assert!(reply.is_err());
    }
}
