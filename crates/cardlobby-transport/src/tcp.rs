//! TCP listener and framed connections built on `tokio::net`.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use cardlobby_protocol::frame::{self, HEADER_LEN};
use cardlobby_protocol::{ConnectionId, PacketType, RawPacket};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

use crate::TransportError;

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_connection_id() -> ConnectionId {
    ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
}

// ---------------------------------------------------------------------------
// TcpTransport
// ---------------------------------------------------------------------------

/// Listens for incoming lobby connections.
#[derive(Debug)]
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Binds a new transport to the given address.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        if let Ok(local) = listener.local_addr() {
            tracing::info!(%local, "TCP transport listening");
        }
        Ok(Self { listener })
    }

    /// Returns the local address the transport is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Waits for and accepts the next incoming connection.
    pub async fn accept(&self) -> Result<TcpConnection, TransportError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        // Frames are small and latency matters more than throughput.
        stream.set_nodelay(true).ok();

        let id = next_connection_id();
        tracing::debug!(%id, %peer, "accepted TCP connection");
        Ok(TcpConnection { id, peer, stream })
    }
}

// ---------------------------------------------------------------------------
// TcpConnection
// ---------------------------------------------------------------------------

/// One framed TCP connection.
#[derive(Debug)]
pub struct TcpConnection {
    id: ConnectionId,
    peer: SocketAddr,
    stream: TcpStream,
}

impl TcpConnection {
    /// Opens a client connection to a lobby.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(TransportError::ReceiveFailed)?;
        let peer = stream.peer_addr().map_err(TransportError::ReceiveFailed)?;
        stream.set_nodelay(true).ok();
        Ok(Self {
            id: next_connection_id(),
            peer,
            stream,
        })
    }

    /// Returns the unique identifier for this connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Reads one complete frame. No deadline is applied; wrap the call in
    /// `tokio::time::timeout` to bound it.
    pub async fn recv_packet(&mut self) -> Result<RawPacket, TransportError> {
        let first = read_type_byte(&mut self.stream).await?;
        read_frame_rest(&mut self.stream, first).await
    }

    /// Writes one complete frame and flushes it.
    pub async fn send_packet(&mut self, packet: &RawPacket) -> Result<(), TransportError> {
        write_frame(&mut self.stream, packet).await
    }

    /// Splits the connection into independently owned read and write halves.
    pub fn into_split(self) -> (PacketReader, PacketWriter) {
        let (read, write) = self.stream.into_split();
        (
            PacketReader { id: self.id, half: read },
            PacketWriter { id: self.id, half: write },
        )
    }
}

/// Read half of a split [`TcpConnection`].
#[derive(Debug)]
pub struct PacketReader {
    id: ConnectionId,
    half: OwnedReadHalf,
}

impl PacketReader {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Waits for the next frame.
    ///
    /// Waiting for the type byte is unbounded: an attached player may stay
    /// silent for as long as they like. Once a frame has started, the rest
    /// of it must arrive within `body_timeout`.
    pub async fn recv_packet(
        &mut self,
        body_timeout: Duration,
    ) -> Result<RawPacket, TransportError> {
        let first = read_type_byte(&mut self.half).await?;
        tokio::time::timeout(body_timeout, read_frame_rest(&mut self.half, first))
            .await
            .map_err(|_| TransportError::Timeout(body_timeout))?
    }
}

/// Write half of a split [`TcpConnection`].
#[derive(Debug)]
pub struct PacketWriter {
    id: ConnectionId,
    half: OwnedWriteHalf,
}

impl PacketWriter {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Writes one complete frame and flushes it.
    pub async fn send_packet(&mut self, packet: &RawPacket) -> Result<(), TransportError> {
        write_frame(&mut self.half, packet).await
    }

    /// Shuts down the write direction, signalling EOF to the peer.
    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.half.shutdown().await.map_err(TransportError::SendFailed)
    }
}

// ---------------------------------------------------------------------------
// Frame I/O
// ---------------------------------------------------------------------------

/// Reads the leading type byte and rejects unknown types immediately,
/// before any length or payload is consumed.
async fn read_type_byte<R: AsyncRead + Unpin>(reader: &mut R) -> Result<u8, TransportError> {
    let mut byte = [0u8; 1];
    match reader.read(&mut byte).await {
        Ok(0) => Err(TransportError::ConnectionClosed("end of stream".into())),
        Ok(_) => {
            PacketType::try_from(byte[0])?;
            Ok(byte[0])
        }
        Err(e) => Err(TransportError::ReceiveFailed(e)),
    }
}

async fn read_frame_rest<R: AsyncRead + Unpin>(
    reader: &mut R,
    first: u8,
) -> Result<RawPacket, TransportError> {
    let mut header = [0u8; HEADER_LEN];
    header[0] = first;
    reader
        .read_exact(&mut header[1..])
        .await
        .map_err(mid_frame_error)?;
    let (kind, len) = frame::parse_header(header)?;

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.map_err(mid_frame_error)?;
    Ok(RawPacket::new(kind, payload))
}

async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    packet: &RawPacket,
) -> Result<(), TransportError> {
    let bytes = packet.to_bytes()?;
    writer
        .write_all(&bytes)
        .await
        .map_err(TransportError::SendFailed)?;
    writer.flush().await.map_err(TransportError::SendFailed)
}

fn mid_frame_error(e: io::Error) -> TransportError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        TransportError::ConnectionClosed("stream ended inside a frame".into())
    } else {
        TransportError::ReceiveFailed(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_frame_from_in_memory_stream() {
        let bytes = RawPacket::new(PacketType::RoomsRequest, b"{}".to_vec())
            .to_bytes()
            .unwrap();
        let mut reader = bytes.as_slice();

        let first = read_type_byte(&mut reader).await.unwrap();
        let packet = read_frame_rest(&mut reader, first).await.unwrap();
        assert_eq!(packet.kind, PacketType::RoomsRequest);
        assert_eq!(packet.payload, b"{}");
    }

    #[tokio::test]
    async fn test_empty_stream_is_connection_closed() {
        let mut reader: &[u8] = &[];
        let err = read_type_byte(&mut reader).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed(_)));
    }

    #[tokio::test]
    async fn test_stream_ending_mid_frame_is_connection_closed() {
        let mut reader: &[u8] = &[0, 0, 0];
        let first = read_type_byte(&mut reader).await.unwrap();
        let err = read_frame_rest(&mut reader, first).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed(_)));
    }

    #[tokio::test]
    async fn test_unknown_type_byte_is_a_protocol_error() {
        let mut reader: &[u8] = &[99, 0, 0, 0, 0];
        let err = read_type_byte(&mut reader).await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::Protocol(cardlobby_protocol::ProtocolError::UnknownPacketType(99))
        ));
    }
}
