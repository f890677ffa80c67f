//! Newline-delimited JSON transport for the control plane
//!
//! One `MessageEnvelope` per line. The reader and writer halves are
//! independent so the two directions of the duplex connection can be
//! driven from separate tasks.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::error::IpcError;
use crate::protocol::{MessageEnvelope, CONTROL_PROTOCOL_VERSION};

/// Reads envelopes from the receive side of a connection
pub struct MessageReader<R> {
    inner: BufReader<R>,
    line: String,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            line: String::new(),
        }
    }

    /// Receive the next envelope, verifying protocol compatibility
    pub async fn read<T: DeserializeOwned>(&mut self) -> Result<MessageEnvelope<T>, IpcError> {
        self.line.clear();
        let n = self.inner.read_line(&mut self.line).await?;
        if n == 0 {
            return Err(IpcError::ConnectionClosed);
        }

        // On the read path every parse failure is a deserialization
        // problem, whatever serde classifies it as; callers use the
        // distinction to skip bad lines without dropping the connection
        let envelope: MessageEnvelope<T> = serde_json::from_str(self.line.trim_end())
            .map_err(|e| IpcError::DeserializationError(e.to_string()))?;

        if envelope.protocol_version != CONTROL_PROTOCOL_VERSION {
            return Err(IpcError::ProtocolVersionMismatch {
                expected: CONTROL_PROTOCOL_VERSION,
                actual: envelope.protocol_version,
            });
        }

        Ok(envelope)
    }
}

/// Writes envelopes to the send side of a connection
pub struct MessageWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Send one envelope as a single newline-delimited JSON line
    pub async fn write<T: Serialize>(&mut self, message: &MessageEnvelope<T>) -> Result<(), IpcError> {
        let json = serde_json::to_string(message)?;
        self.write_line(&json).await
    }

    /// Send an already-serialized envelope line
    pub async fn write_line(&mut self, json: &str) -> Result<(), IpcError> {
        self.inner.write_all(json.as_bytes()).await?;
        self.inner.write_all(b"\n").await?;
        self.inner.flush().await?;
        Ok(())
    }
}

/// One persistent duplex control connection
pub struct ControlChannel {
    reader: MessageReader<OwnedReadHalf>,
    writer: MessageWriter<OwnedWriteHalf>,
}

impl ControlChannel {
    /// Wrap an accepted stream
    pub fn new(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: MessageReader::new(read_half),
            writer: MessageWriter::new(write_half),
        }
    }

    /// Dial the master's control listener
    pub async fn connect(addr: &str) -> Result<Self, IpcError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::new(stream))
    }

    /// Send one envelope
    pub async fn send<T: Serialize>(&mut self, message: &MessageEnvelope<T>) -> Result<(), IpcError> {
        self.writer.write(message).await
    }

    /// Receive the next envelope
    pub async fn recv<T: DeserializeOwned>(&mut self) -> Result<MessageEnvelope<T>, IpcError> {
        self.reader.read().await
    }

    /// Split into independent read and write halves
    pub fn split(self) -> (MessageReader<OwnedReadHalf>, MessageWriter<OwnedWriteHalf>) {
        (self.reader, self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MasterBound;

    #[tokio::test]
    async fn test_envelope_roundtrip_over_duplex() {
        let (client, server) = tokio::io::duplex(4096);
        let mut writer = MessageWriter::new(client);
        let mut reader = MessageReader::new(server);

        let envelope = MessageEnvelope::new(MasterBound::Connected { worker_id: 2 });
        writer.write(&envelope).await.unwrap();

        let received: MessageEnvelope<MasterBound> = reader.read().await.unwrap();
        match received.message {
            MasterBound::Connected { worker_id } => assert_eq!(worker_id, 2),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_closed_connection_reported() {
        let (client, server) = tokio::io::duplex(64);
        drop(client);

        let mut reader = MessageReader::new(server);
        let result = reader.read::<MasterBound>().await;
        assert!(matches!(result, Err(IpcError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_garbage_line_reported_as_deserialization_error() {
        let (client, server) = tokio::io::duplex(4096);
        let mut writer = MessageWriter::new(client);
        let mut reader = MessageReader::new(server);

        writer.write_line("{ this is not an envelope").await.unwrap();
        let result = reader.read::<MasterBound>().await;
        assert!(matches!(result, Err(IpcError::DeserializationError(_))));

        // The connection itself stays usable
        writer
            .write(&MessageEnvelope::new(MasterBound::Connected { worker_id: 1 }))
            .await
            .unwrap();
        let received: MessageEnvelope<MasterBound> = reader.read().await.unwrap();
        assert!(matches!(received.message, MasterBound::Connected { worker_id: 1 }));
    }

    #[tokio::test]
    async fn test_protocol_version_mismatch_rejected() {
        let (client, server) = tokio::io::duplex(4096);
        let mut writer = MessageWriter::new(client);
        let mut reader = MessageReader::new(server);

        let mut envelope = MessageEnvelope::new(MasterBound::Connected { worker_id: 0 });
        envelope.protocol_version = 99;
        writer.write(&envelope).await.unwrap();

        let result = reader.read::<MasterBound>().await;
        assert!(matches!(
            result,
            Err(IpcError::ProtocolVersionMismatch { expected: CONTROL_PROTOCOL_VERSION, actual: 99 })
        ));
    }
}
