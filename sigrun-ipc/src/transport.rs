//! IPC transport implementations
//!
//! Every message is one JSON-encoded [`MessageEnvelope`] followed by `\n`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::IpcError;
use crate::protocol::{MessageEnvelope, IPC_PROTOCOL_VERSION};

/// IPC transport trait for different communication mechanisms
#[async_trait]
pub trait IpcTransport: Send {
    /// Send a message to the other end
    async fn send<T: Serialize + Send + Sync>(&mut self, message: &T) -> Result<(), IpcError>;

    /// Receive a message from the other end
    async fn receive<T: DeserializeOwned + Send>(&mut self) -> Result<MessageEnvelope<T>, IpcError>;

    /// Close the transport
    async fn close(&mut self) -> Result<(), IpcError>;
}

/// Writing half: frames messages into envelopes
pub struct LineWriter<W> {
    inner: Option<W>,
}

impl<W: AsyncWrite + Unpin + Send> LineWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner: Some(inner) }
    }

    pub async fn send<T: Serialize + Send + Sync>(&mut self, message: &T) -> Result<(), IpcError> {
        let writer = self.inner.as_mut().ok_or(IpcError::ConnectionClosed)?;

        let mut line = serde_json::to_vec(&MessageEnvelope::new(message))
            .map_err(|e| IpcError::SerializationError(e.to_string()))?;
        line.push(b'\n');

        writer.write_all(&line).await?;
        writer.flush().await?;
        log::trace!("Sent {} byte IPC message", line.len());
        Ok(())
    }

    /// Drop the writer, signalling EOF to the peer
    pub async fn close(&mut self) -> Result<(), IpcError> {
        if let Some(mut writer) = self.inner.take() {
            writer.shutdown().await?;
        }
        Ok(())
    }
}

/// Reading half: keeps one buffer across calls so no bytes are lost
/// between messages
pub struct LineReader<R> {
    inner: BufReader<R>,
    line: String,
}

impl<R: AsyncRead + Unpin + Send> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            line: String::new(),
        }
    }

    pub async fn receive<T: DeserializeOwned>(&mut self) -> Result<MessageEnvelope<T>, IpcError> {
        loop {
            self.line.clear();
            let read = self.inner.read_line(&mut self.line).await?;
            if read == 0 {
                return Err(IpcError::ConnectionClosed);
            }

            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let envelope: MessageEnvelope<T> = serde_json::from_str(trimmed)
                .map_err(|e| IpcError::DeserializationError(e.to_string()))?;

            if !envelope.is_compatible() {
                return Err(IpcError::ProtocolVersionMismatch {
                    expected: IPC_PROTOCOL_VERSION,
                    actual: envelope.protocol_version,
                });
            }

            return Ok(envelope);
        }
    }
}

/// A reader and writer pair acting as one bidirectional transport
pub struct StreamTransport<R, W> {
    reader: LineReader<R>,
    writer: LineWriter<W>,
}

impl<R, W> StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: LineReader::new(reader),
            writer: LineWriter::new(writer),
        }
    }

    /// Split back into independently owned halves
    pub fn into_split(self) -> (LineReader<R>, LineWriter<W>) {
        (self.reader, self.writer)
    }
}

/// Stdin/Stdout IPC transport used inside worker processes
pub type StdioTransport = StreamTransport<tokio::io::Stdin, tokio::io::Stdout>;

impl StdioTransport {
    /// Create a new stdio transport
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

#[async_trait]
impl<R, W> IpcTransport for StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn send<T: Serialize + Send + Sync>(&mut self, message: &T) -> Result<(), IpcError> {
        self.writer.send(message).await
    }

    async fn receive<T: DeserializeOwned + Send>(&mut self) -> Result<MessageEnvelope<T>, IpcError> {
        self.reader.receive().await
    }

    async fn close(&mut self) -> Result<(), IpcError> {
        self.writer.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{WorkerReply, WorkerRequest};
    use tokio::io::{duplex, AsyncWriteExt};

    #[tokio::test]
    async fn test_round_trip_over_duplex() {
        let (left, right) = duplex(1024);
        let (left_read, left_write) = tokio::io::split(left);
        let (right_read, right_write) = tokio::io::split(right);

        let mut parent = StreamTransport::new(left_read, left_write);
        let mut child = StreamTransport::new(right_read, right_write);

        parent.send(&WorkerRequest::Ping).await.unwrap();
        parent.send(&WorkerRequest::Shutdown).await.unwrap();

        let first: MessageEnvelope<WorkerRequest> = child.receive().await.unwrap();
        let second: MessageEnvelope<WorkerRequest> = child.receive().await.unwrap();
        assert_eq!(first.message, WorkerRequest::Ping);
        assert_eq!(second.message, WorkerRequest::Shutdown);

        child
            .send(&WorkerReply::Pong { worker_id: 3, tasks_executed: 0 })
            .await
            .unwrap();
        let reply: MessageEnvelope<WorkerReply> = parent.receive().await.unwrap();
        assert_eq!(reply.message, WorkerReply::Pong { worker_id: 3, tasks_executed: 0 });
    }

    #[tokio::test]
    async fn test_eof_is_connection_closed() {
        let (reader, writer) = duplex(64);
        drop(writer);
        let mut lines = LineReader::new(reader);
        let err = lines.receive::<WorkerRequest>().await.unwrap_err();
        assert!(matches!(err, IpcError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_version_mismatch_and_garbage() {
        let (reader, mut writer) = duplex(1024);
        writer.write_all(b"\nnot json\n").await.unwrap();
        writer
            .write_all(b"{\"protocol_version\":99,\"timestamp\":\"2024-01-01T00:00:00Z\",\"message\":{\"type\":\"ping\"}}\n")
            .await
            .unwrap();

        let mut lines = LineReader::new(reader);
        let err = lines.receive::<WorkerRequest>().await.unwrap_err();
        assert!(matches!(err, IpcError::DeserializationError(_)));

        let err = lines.receive::<WorkerRequest>().await.unwrap_err();
        assert!(matches!(err, IpcError::ProtocolVersionMismatch { expected: 1, actual: 99 }));
    }
}
