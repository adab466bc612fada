//! Identity types and the packet-type enumeration.
//!
//! These are the small values every other layer passes around: who a
//! player is, which connection a packet came from, and which kind of
//! packet a frame carries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Number of cards in a constructed deck.
pub const DECK_SIZE: usize = 40;

/// Number of decklist entries a start request must carry.
///
/// Clients send the deck plus three trailing entries (class, ability and
/// quest), which the core reads from the same list.
pub const DECKLIST_LEN: usize = DECK_SIZE + 3;

/// Field separator of the player manifest handed to the core process.
///
/// A display name containing it would corrupt the manifest, so names with
/// this character are rejected before they reach serialization.
pub const NAME_SEPARATOR: char = 'µ';

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The opaque identity handed to a player when their match starts.
///
/// Derived from the process seed and the display name (see
/// `cardlobby-session`), so it is stable for the lifetime of the lobby
/// process. Serialized as a plain JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier for one accepted TCP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// PacketType
// ---------------------------------------------------------------------------

/// The leading type byte of every frame.
///
/// Requests and responses alternate: every request kind is an even byte
/// and its response follows it. `OpponentChangedResponse` is push-only:
/// the lobby writes it unsolicited on an attached connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    CreateRequest = 0,
    CreateResponse = 1,
    JoinRequest = 2,
    JoinResponse = 3,
    LeaveRequest = 4,
    LeaveResponse = 5,
    RoomsRequest = 6,
    RoomsResponse = 7,
    StartRequest = 8,
    StartResponse = 9,
    OpponentChangedResponse = 10,
    AdditionalCardsRequest = 11,
    AdditionalCardsResponse = 12,
}

impl PacketType {
    /// Number of known packet types. Any type byte `>= COUNT` is a
    /// protocol violation.
    pub const COUNT: u8 = 13;

    /// Returns the wire byte for this type.
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Returns `true` for kinds a client may send.
    pub fn is_request(self) -> bool {
        matches!(
            self,
            Self::CreateRequest
                | Self::JoinRequest
                | Self::LeaveRequest
                | Self::RoomsRequest
                | Self::StartRequest
                | Self::AdditionalCardsRequest
        )
    }
}

impl TryFrom<u8> for PacketType {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        let kind = match byte {
            0 => Self::CreateRequest,
            1 => Self::CreateResponse,
            2 => Self::JoinRequest,
            3 => Self::JoinResponse,
            4 => Self::LeaveRequest,
            5 => Self::LeaveResponse,
            6 => Self::RoomsRequest,
            7 => Self::RoomsResponse,
            8 => Self::StartRequest,
            9 => Self::StartResponse,
            10 => Self::OpponentChangedResponse,
            11 => Self::AdditionalCardsRequest,
            12 => Self::AdditionalCardsResponse,
            other => return Err(ProtocolError::UnknownPacketType(other)),
        };
        Ok(kind)
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_type_bytes_round_trip() {
        for byte in 0..PacketType::COUNT {
            let kind = PacketType::try_from(byte).unwrap();
            assert_eq!(kind.as_byte(), byte);
        }
    }

    #[test]
    fn test_packet_type_rejects_out_of_range_byte() {
        let err = PacketType::try_from(PacketType::COUNT).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownPacketType(13)));

        let err = PacketType::try_from(255).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownPacketType(255)));
    }

    #[test]
    fn test_only_request_kinds_are_requests() {
        let requests: Vec<PacketType> = (0..PacketType::COUNT)
            .map(|b| PacketType::try_from(b).unwrap())
            .filter(|k| k.is_request())
            .collect();
        assert_eq!(requests.len(), 6);
        assert!(!PacketType::OpponentChangedResponse.is_request());
        assert!(!PacketType::StartResponse.is_request());
    }

    #[test]
    fn test_player_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&PlayerId("AB12".into())).unwrap();
        assert_eq!(json, "\"AB12\"");
    }

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
        assert_eq!(ConnectionId::new(7).into_inner(), 7);
    }

    #[test]
    fn test_decklist_len_includes_extra_entries() {
        assert_eq!(DECKLIST_LEN, 43);
    }
}
