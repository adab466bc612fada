//! Wire protocol for the card lobby.
//!
//! Every exchange between a client and the lobby is a sequence of
//! packets. A packet on the wire is a frame:
//!
//! ```text
//! ┌──────────┬──────────────────┬───────────────────────┐
//! │ type: u8 │ length: u32 (BE) │ payload: length bytes │
//! └──────────┴──────────────────┴───────────────────────┘
//! ```
//!
//! - **Types** ([`PacketType`], [`PlayerId`], [`ConnectionId`]): the
//!   identifiers that travel with or describe packets.
//! - **Packets** ([`ClientPacket`], [`ServerPacket`] and their bodies):
//!   the typed requests and responses.
//! - **Frames** ([`RawPacket`], [`frame`]): the untyped type-tag plus
//!   payload, before the body is decoded.
//! - **Codec** ([`Codec`], [`JsonCodec`]): how bodies become bytes.
//!
//! ```text
//! Transport (frames) → Protocol (ClientPacket / ServerPacket) → Room registry
//! ```
//!
//! The protocol layer knows nothing about sockets or rooms.

mod codec;
mod error;
pub mod frame;
mod packets;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use frame::RawPacket;
pub use packets::{
    Ack, AdditionalCardsRequest, AdditionalCardsResponse, ClientPacket,
    CreateRequest, JoinRequest, LeaveRequest, OpponentChanged, RoomsRequest,
    RoomsResponse, ServerPacket, StartRequest, StartResponse, StartResult,
};
pub use types::{
    ConnectionId, DECK_SIZE, DECKLIST_LEN, NAME_SEPARATOR, PacketType,
    PlayerId,
};
