use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::RpcError;
use crate::identity::Identity;

/// Upper bound on a single length-prefixed frame.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    id: u64,
    identity: Identity,
    operation: String,
    params: Vec<u8>,
}

impl Request {
    pub fn new(id: u64, identity: Identity, operation: String, params: Vec<u8>) -> Self {
        Self {
            id,
            identity,
            operation,
            params,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn params(&self) -> &[u8] {
        &self.params
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Reply {
    id: u64,
    result: Option<Vec<u8>>,
    error: Option<String>,
}

impl Reply {
    pub fn new(id: u64, result: Option<Vec<u8>>, error: Option<String>) -> Self {
        Self { id, result, error }
    }

    pub fn from_result(id: u64, result: Result<Vec<u8>, RpcError>) -> Self {
        match result {
            Ok(data) => Self::new(id, Some(data), None),
            Err(e) => Self::new(id, None, Some(e.to_string())),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn result(&self) -> Option<&Vec<u8>> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&String> {
        self.error.as_ref()
    }
}

/// Writes one payload as a u32-LE length-prefixed frame.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), RpcError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME_SIZE {
        return Err(RpcError::FrameTooLarge {
            size: payload.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    writer
        .write_all(&(payload.len() as u32).to_le_bytes())
        .await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one length-prefixed frame. Returns `None` on a clean end of
/// stream, either the peer closing before a length prefix or a zero-length
/// end marker.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, RpcError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes([len_buf[0], len_buf[1], len_buf[2], len_buf[3]]) as usize;
    if len == 0 {
        return Ok(None);
    }
    if len > MAX_FRAME_SIZE {
        return Err(RpcError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}
