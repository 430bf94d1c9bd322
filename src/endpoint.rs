use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::error::RpcError;
use crate::identity::Identity;
use crate::registry::{Handler, HandlerRegistry, SharedHandlerRegistry};
use crate::wire::{read_frame, write_frame, Reply, Request};

pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub bind_address: String,

    pub drain_timeout: Duration,
}

impl EndpointConfig {
    pub fn new(bind_address: impl Into<String>) -> Self {
        Self {
            bind_address: bind_address.into(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }
}

/// A TCP endpoint hosting handler objects keyed by identity.
///
/// Lifecycle: `bind`, register handlers, `activate`, and eventually
/// `deactivate`. Handlers are registered before activation; the registry is
/// only read afterwards.
pub struct Endpoint {
    config: EndpointConfig,
    registry: SharedHandlerRegistry,
    listener: Option<TcpListener>,
    socket_addr: Option<SocketAddr>,
    shutdown: Option<watch::Sender<bool>>,
    accept_task: Option<JoinHandle<()>>,
}

impl Endpoint {
    pub fn new(config: EndpointConfig) -> Self {
        Self {
            config,
            registry: SharedHandlerRegistry::new(),
            listener: None,
            socket_addr: None,
            shutdown: None,
            accept_task: None,
        }
    }

    /// Binds the listener without starting to serve. Connections queue in
    /// the accept backlog until `activate`.
    pub async fn bind(&mut self) -> Result<SocketAddr, RpcError> {
        let listener = TcpListener::bind(self.config.bind_address.as_str()).await?;
        let local_addr = listener.local_addr()?;

        self.listener = Some(listener);
        self.socket_addr = Some(local_addr);
        info!("endpoint bound at {}", local_addr);
        Ok(local_addr)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket_addr
    }

    pub fn add(&self, identity: Identity, handler: Arc<dyn Handler>) {
        self.registry.insert(identity, handler);
    }

    /// Registers a handler under a generated identity and returns it.
    pub fn add_unique(&self, handler: Arc<dyn Handler>) -> Identity {
        let identity = Identity::random();
        self.registry.insert(identity.clone(), handler);
        identity
    }

    pub fn registered(&self) -> usize {
        self.registry.len()
    }

    /// Starts the accept loop. Each accepted connection is served by its
    /// own task until the peer closes or the endpoint deactivates.
    pub fn activate(&mut self) -> Result<(), RpcError> {
        if self.accept_task.is_some() {
            return Err(RpcError::ConfigError("Endpoint already active".to_string()));
        }
        let listener = self
            .listener
            .take()
            .ok_or_else(|| RpcError::ConfigError("Endpoint not bound".to_string()))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let registry = self.registry.clone();
        let drain_timeout = self.config.drain_timeout;

        let task = tokio::spawn(accept_loop(listener, registry, shutdown_rx, drain_timeout));

        self.shutdown = Some(shutdown_tx);
        self.accept_task = Some(task);
        Ok(())
    }

    /// Stops accepting, lets in-flight requests finish, and aborts any
    /// connection task still running after the drain timeout.
    pub async fn deactivate(&mut self) -> Result<(), RpcError> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(task) = self.accept_task.take() {
            task.await
                .map_err(|e| RpcError::StreamError(e.to_string()))?;
            info!("endpoint drained");
        }
        Ok(())
    }
}

async fn accept_loop(
    listener: TcpListener,
    registry: SharedHandlerRegistry,
    mut shutdown: watch::Receiver<bool>,
    drain_timeout: Duration,
) {
    let mut connections = JoinSet::new();
    // Cloned outside the loop; `wait_for` holds a mutable borrow on
    // `shutdown` for the whole select.
    let conn_shutdown = shutdown.clone();

    loop {
        tokio::select! {
            _ = shutdown.wait_for(|stop| *stop) => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!(peer = %peer, "accepted connection");
                        connections.spawn(serve_connection(
                            stream,
                            registry.clone(),
                            conn_shutdown.clone(),
                        ));
                    }
                    Err(e) => {
                        warn!("accept error: {}", e);
                    }
                }
            }
        }
    }

    // Refuse new connections before draining the existing ones.
    drop(listener);

    let drain = async {
        while connections.join_next().await.is_some() {}
    };
    if tokio::time::timeout(drain_timeout, drain).await.is_err() {
        warn!(
            remaining = connections.len(),
            "drain timeout elapsed, aborting remaining connections"
        );
        connections.shutdown().await;
    }
}

async fn serve_connection(
    stream: TcpStream,
    registry: SharedHandlerRegistry,
    mut shutdown: watch::Receiver<bool>,
) {
    let peer = stream.peer_addr().ok();
    let (mut reader, mut writer) = stream.into_split();

    loop {
        let frame = tokio::select! {
            _ = shutdown.wait_for(|stop| *stop) => break,
            frame = read_frame(&mut reader) => frame,
        };

        match frame {
            Ok(Some(payload)) => {
                if !handle_request(&registry, &payload, &mut writer).await {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(peer = ?peer, "closing connection: {}", e);
                break;
            }
        }
    }

    debug!(peer = ?peer, "connection closed");
}

/// Decodes, dispatches and replies to one request. Returns `false` when the
/// connection should be dropped.
async fn handle_request(
    registry: &SharedHandlerRegistry,
    payload: &[u8],
    writer: &mut OwnedWriteHalf,
) -> bool {
    let request: Request = match bincode::deserialize(payload) {
        Ok(request) => request,
        Err(e) => {
            debug!("undecodable request: {}", e);
            return false;
        }
    };

    let reply = dispatch(registry, request).await;
    let reply_data = match bincode::serialize(&reply) {
        Ok(data) => data,
        Err(e) => {
            warn!("failed to encode reply: {}", e);
            return false;
        }
    };

    if let Err(e) = write_frame(writer, &reply_data).await {
        debug!("failed to send reply: {}", e);
        return false;
    }
    true
}

async fn dispatch(registry: &SharedHandlerRegistry, request: Request) -> Reply {
    let result = match registry.get(request.identity()) {
        Some(handler) => handler.handle(request.operation(), request.params()).await,
        None => Err(RpcError::UnknownIdentity(request.identity().to_string())),
    };
    Reply::from_result(request.id(), result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::greeting::Greeter;

    #[tokio::test]
    async fn test_bind_assigns_local_addr() {
        let mut endpoint = Endpoint::new(EndpointConfig::new("127.0.0.1:0"));
        let addr = endpoint.bind().await.unwrap();

        assert_eq!(endpoint.local_addr(), Some(addr));
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_add_unique_generates_distinct_identities() {
        let endpoint = Endpoint::new(EndpointConfig::new("127.0.0.1:0"));

        let first = endpoint.add_unique(Arc::new(Greeter::new()));
        let second = endpoint.add_unique(Arc::new(Greeter::new()));

        assert_ne!(first, second);
        assert_eq!(endpoint.registered(), 2);
    }

    #[tokio::test]
    async fn test_activate_requires_bind() {
        let mut endpoint = Endpoint::new(EndpointConfig::new("127.0.0.1:0"));
        let result = endpoint.activate();

        assert!(matches!(result, Err(RpcError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_activate_twice_is_an_error() {
        let mut endpoint = Endpoint::new(EndpointConfig::new("127.0.0.1:0"));
        endpoint.bind().await.unwrap();
        endpoint.activate().unwrap();

        assert!(matches!(
            endpoint.activate(),
            Err(RpcError::ConfigError(_))
        ));

        endpoint.deactivate().await.unwrap();
    }

    #[tokio::test]
    async fn test_deactivate_without_activate_is_a_noop() {
        let mut endpoint = Endpoint::new(EndpointConfig::new("127.0.0.1:0"));
        endpoint.deactivate().await.unwrap();
    }
}
