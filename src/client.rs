use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::RpcError;
use crate::identity::Identity;
use crate::wire::{read_frame, write_frame, Reply, Request};
use crate::DEFAULT_TIMEOUT;

/// Connection to one endpoint. Invocations share the connection and are
/// serialized on it; requests carry a per-connection correlation id.
pub struct Client {
    stream: Mutex<Option<TcpStream>>,
    next_id: AtomicU64,
}

impl Client {
    pub async fn connect(addr: SocketAddr) -> Result<Self, RpcError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| RpcError::ConnectionError(e.to_string()))?;
        debug!(peer = %addr, "connected");

        Ok(Self {
            stream: Mutex::new(Some(stream)),
            next_id: AtomicU64::new(1),
        })
    }

    /// Invokes `operation` on the handler registered under `identity` and
    /// returns the raw result payload. An error reply from the endpoint
    /// surfaces as [`RpcError::StreamError`]. A reply timeout closes the
    /// connection; later invocations fail with [`RpcError::ConnectionError`].
    pub async fn invoke(
        &self,
        identity: &Identity,
        operation: &str,
        params: Vec<u8>,
    ) -> Result<Vec<u8>, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = Request::new(id, identity.clone(), operation.to_string(), params);
        let request_data = bincode::serialize(&request)?;

        let mut stream = self.stream.lock().await;
        let conn = stream.as_mut().ok_or_else(|| {
            RpcError::ConnectionError("Connection closed after a reply timeout".to_string())
        })?;
        write_frame(&mut *conn, &request_data).await?;

        match tokio::time::timeout(DEFAULT_TIMEOUT, read_reply(conn, id)).await {
            Ok(result) => result,
            Err(_) => {
                // The cancelled read may have stopped inside a frame; the
                // stream is no longer at a frame boundary, so drop it.
                *stream = None;
                Err(RpcError::Timeout)
            }
        }
    }
}

async fn read_reply(stream: &mut TcpStream, id: u64) -> Result<Vec<u8>, RpcError> {
    loop {
        let payload = match read_frame(stream).await? {
            Some(payload) => payload,
            None => {
                return Err(RpcError::ConnectionError(
                    "Stream closed unexpectedly".to_string(),
                ))
            }
        };

        let reply: Reply = bincode::deserialize(&payload)?;
        if reply.id() != id {
            // A reply left behind by an earlier abandoned invocation.
            debug!(stale = reply.id(), expected = id, "skipping stale reply");
            continue;
        }

        return match (reply.result(), reply.error()) {
            (Some(data), None) => Ok(data.to_vec()),
            (None, Some(err_msg)) => Err(RpcError::StreamError(err_msg.to_string())),
            _ => Err(RpcError::StreamError("Invalid reply".to_string())),
        };
    }
}
