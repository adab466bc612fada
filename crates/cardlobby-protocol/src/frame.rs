//! Frame layout: a type byte, a big-endian `u32` length, then the payload.
//!
//! [`RawPacket`] is a frame whose body has not been decoded yet. The
//! transport reads and writes frames; [`ClientPacket`](crate::ClientPacket)
//! and [`ServerPacket`](crate::ServerPacket) turn them into typed bodies.

use crate::{PacketType, ProtocolError};

/// Size of the frame header: one type byte plus a four-byte length.
pub const HEADER_LEN: usize = 5;

/// Largest accepted payload (16 MiB). The additional-cards catalog is the
/// biggest body the lobby sends.
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// A framed packet: its type and the still-encoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub kind: PacketType,
    pub payload: Vec<u8>,
}

impl RawPacket {
    pub fn new(kind: PacketType, payload: Vec<u8>) -> Self {
        Self { kind, payload }
    }

    /// Serializes the whole frame (header + payload).
    ///
    /// # Errors
    /// Returns [`ProtocolError::PayloadTooLarge`] if the payload exceeds
    /// [`MAX_PAYLOAD_SIZE`].
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let header = encode_header(self.kind, self.payload.len())?;
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.payload.len());
        bytes.extend_from_slice(&header);
        bytes.extend_from_slice(&self.payload);
        Ok(bytes)
    }

    /// Parses one complete frame from the start of `bytes`.
    ///
    /// Returns the packet and the number of bytes consumed.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, usize), ProtocolError> {
        let header: [u8; HEADER_LEN] = bytes
            .get(..HEADER_LEN)
            .and_then(|h| h.try_into().ok())
            .ok_or(ProtocolError::Truncated {
                expected: HEADER_LEN,
                actual: bytes.len(),
            })?;
        let (kind, len) = parse_header(header)?;
        let end = HEADER_LEN + len;
        let payload = bytes.get(HEADER_LEN..end).ok_or(ProtocolError::Truncated {
            expected: end,
            actual: bytes.len(),
        })?;
        Ok((Self::new(kind, payload.to_vec()), end))
    }
}

/// Builds the five-byte header for a payload of `len` bytes.
pub fn encode_header(
    kind: PacketType,
    len: usize,
) -> Result<[u8; HEADER_LEN], ProtocolError> {
    if len > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge(len));
    }
    let len = u32::try_from(len).map_err(|_| ProtocolError::PayloadTooLarge(len))?;
    let mut header = [0u8; HEADER_LEN];
    header[0] = kind.as_byte();
    header[1..].copy_from_slice(&len.to_be_bytes());
    Ok(header)
}

/// Splits a header into its packet type and payload length.
///
/// The type byte is validated first, so an unknown type is reported even
/// when the length is also bogus.
pub fn parse_header(
    header: [u8; HEADER_LEN],
) -> Result<(PacketType, usize), ProtocolError> {
    let kind = PacketType::try_from(header[0])?;
    let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
    if len > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge(len));
    }
    Ok((kind, len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout_is_type_then_big_endian_length() {
        let packet = RawPacket::new(PacketType::JoinRequest, b"{}".to_vec());
        let bytes = packet.to_bytes().unwrap();
        assert_eq!(bytes, vec![2, 0, 0, 0, 2, b'{', b'}']);
    }

    #[test]
    fn test_from_bytes_reports_consumed_length() {
        let mut bytes = RawPacket::new(PacketType::RoomsRequest, b"{}".to_vec())
            .to_bytes()
            .unwrap();
        bytes.extend_from_slice(&[9, 9, 9]);

        let (packet, used) = RawPacket::from_bytes(&bytes).unwrap();
        assert_eq!(packet.kind, PacketType::RoomsRequest);
        assert_eq!(packet.payload, b"{}");
        assert_eq!(used, 7);
    }

    #[test]
    fn test_unknown_type_byte_is_rejected_before_length() {
        let header = [200, 0xff, 0xff, 0xff, 0xff];
        let err = parse_header(header).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownPacketType(200)));
    }

    #[test]
    fn test_oversized_length_is_rejected() {
        let len = (MAX_PAYLOAD_SIZE as u32 + 1).to_be_bytes();
        let header = [0, len[0], len[1], len[2], len[3]];
        let err = parse_header(header).unwrap_err();
        assert!(matches!(err, ProtocolError::PayloadTooLarge(_)));

        let err = encode_header(PacketType::CreateRequest, MAX_PAYLOAD_SIZE + 1)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::PayloadTooLarge(_)));
    }

    #[test]
    fn test_truncated_frames() {
        let err = RawPacket::from_bytes(&[0, 0]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Truncated { expected: 5, actual: 2 }
        ));

        let err = RawPacket::from_bytes(&[0, 0, 0, 0, 4, b'{']).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Truncated { expected: 9, actual: 6 }
        ));
    }
}
