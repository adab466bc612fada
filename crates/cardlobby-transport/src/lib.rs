//! Framed TCP transport for the card lobby.
//!
//! [`TcpTransport`] accepts connections; each [`TcpConnection`] reads and
//! writes whole frames ([`RawPacket`](cardlobby_protocol::RawPacket)).
//! A connection that stays open after its first exchange is split into a
//! [`PacketReader`] and a [`PacketWriter`] so reading and writing can be
//! driven from different tasks.

mod error;
mod tcp;

pub use cardlobby_protocol::ConnectionId;
pub use error::TransportError;
pub use tcp::{PacketReader, PacketWriter, TcpConnection, TcpTransport};
