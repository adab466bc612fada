//! Error types for the protocol layer.

use crate::PacketType;

/// Errors that can occur while framing, encoding, or decoding packets.
///
/// Every variant is a protocol error: fatal to the exchange it occurred
/// in, never to the lobby.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serializing a packet body failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The payload could not be parsed as the body its type tag announces.
    #[error("malformed {kind} payload: {source}")]
    Malformed {
        kind: PacketType,
        #[source]
        source: serde_json::Error,
    },

    /// The leading type byte is outside the known enumeration.
    #[error("unknown packet type {0}")]
    UnknownPacketType(u8),

    /// A known packet type arrived where it is not allowed, e.g. a
    /// response kind sent by a client.
    #[error("unexpected packet {0}")]
    UnexpectedPacket(PacketType),

    /// The length prefix exceeds [`MAX_PAYLOAD_SIZE`](crate::frame::MAX_PAYLOAD_SIZE).
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    /// A frame ended before its header or payload was complete.
    #[error("truncated frame: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}
