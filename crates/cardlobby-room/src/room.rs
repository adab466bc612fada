//! A waiting room and its two seats.
//!
//! Rooms are plain data owned by the [`RoomRegistry`](crate::RoomRegistry).
//! Outbound traffic to a seated player goes through that player's
//! [`PlayerSender`]; dropping the last sender closes the connection.

use std::time::Instant;

use cardlobby_protocol::{ConnectionId, PlayerId, ServerPacket};
use tokio::sync::mpsc;

use crate::running::MatchKey;

/// Channel sender for delivering packets to a player's connection writer.
pub type PlayerSender = mpsc::UnboundedSender<ServerPacket>;

/// The connection a seated player is reachable on.
#[derive(Debug, Clone)]
pub struct PlayerLink {
    pub connection: ConnectionId,
    pub sender: PlayerSender,
}

impl PlayerLink {
    pub fn new(connection: ConnectionId, sender: PlayerSender) -> Self {
        Self { connection, sender }
    }

    /// Queues a packet for the player. A closed connection is not an
    /// error here: its reader reports the disconnect separately.
    pub fn push(&self, packet: ServerPacket) {
        if self.sender.send(packet).is_err() {
            tracing::debug!(conn_id = %self.connection, "push to closed connection dropped");
        }
    }
}

// ---------------------------------------------------------------------------
// Seat
// ---------------------------------------------------------------------------

/// One occupied player slot.
#[derive(Debug)]
pub struct Seat {
    pub(crate) name: String,
    pub(crate) id: PlayerId,
    pub(crate) decklist: Vec<String>,
    pub(crate) ready: bool,
    pub(crate) noshuffle: bool,
    pub(crate) link: PlayerLink,
}

impl Seat {
    pub(crate) fn new(name: String, id: PlayerId, link: PlayerLink) -> Self {
        Self {
            name,
            id,
            decklist: Vec::new(),
            ready: false,
            noshuffle: false,
            link,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &PlayerId {
        &self.id
    }

    pub fn decklist(&self) -> &[String] {
        &self.decklist
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn noshuffle(&self) -> bool {
        self.noshuffle
    }

    pub fn connection(&self) -> ConnectionId {
        self.link.connection
    }

    pub fn link(&self) -> &PlayerLink {
        &self.link
    }
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// Where a waiting room is in its lifecycle.
///
/// ```text
/// Forming → Paired → ReadyPending → Starting → (handed off, removed)
/// ```
///
/// The state is derived from the seats rather than stored, so it can never
/// disagree with them. A room whose launch failed stays in `Starting` until
/// a player resubmits their start request or leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    /// One seat is occupied.
    Forming,
    /// Both seats are occupied, nobody is ready.
    Paired,
    /// Both seats are occupied, one player is ready.
    ReadyPending,
    /// Both players are ready.
    Starting,
}

impl RoomState {
    /// Returns `true` if the room shows up in the room list.
    pub fn is_listed(self) -> bool {
        !matches!(self, Self::Starting)
    }
}

impl std::fmt::Display for RoomState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// A matchmaking session with two seats and one reserved port.
#[derive(Debug)]
pub struct Room {
    pub(crate) port: u16,
    pub(crate) seats: [Option<Seat>; 2],
    pub(crate) created_at: Instant,
}

impl Room {
    pub(crate) fn new(port: u16, host: Seat) -> Self {
        Self {
            port,
            seats: [Some(host), None],
            created_at: Instant::now(),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn seat(&self, index: usize) -> Option<&Seat> {
        self.seats.get(index).and_then(Option::as_ref)
    }

    pub fn seats(&self) -> impl Iterator<Item = &Seat> {
        self.seats.iter().flatten()
    }

    /// The name shown in the room list: seat 0, or seat 1 if seat 0 left.
    pub fn host_name(&self) -> Option<&str> {
        self.seats().next().map(Seat::name)
    }

    pub fn is_empty(&self) -> bool {
        self.seats.iter().all(Option::is_none)
    }

    pub fn state(&self) -> RoomState {
        match &self.seats {
            [Some(a), Some(b)] => match (a.ready, b.ready) {
                (true, true) => RoomState::Starting,
                (false, false) => RoomState::Paired,
                _ => RoomState::ReadyPending,
            },
            _ => RoomState::Forming,
        }
    }

    pub(crate) fn seat_index_of(&self, name: &str) -> Option<usize> {
        self.seats
            .iter()
            .position(|s| s.as_ref().is_some_and(|s| s.name == name))
    }

    pub(crate) fn seat_index_on(&self, connection: ConnectionId) -> Option<usize> {
        self.seats
            .iter()
            .position(|s| s.as_ref().is_some_and(|s| s.link.connection == connection))
    }

    pub(crate) fn has_player(&self, name: &str) -> bool {
        self.seat_index_of(name).is_some()
    }

    /// Empties seat `index` and tells the other occupant, if any, that
    /// their opponent is gone. Returns the removed seat.
    pub(crate) fn vacate(&mut self, index: usize) -> Option<Seat> {
        let seat = self.seats.get_mut(index)?.take()?;
        if let Some(other) = self.seats.get(1 - index).and_then(Option::as_ref) {
            other.link.push(ServerPacket::OpponentChanged(
                cardlobby_protocol::OpponentChanged { name: None },
            ));
        }
        Some(seat)
    }
}

// ---------------------------------------------------------------------------
// MatchPlan
// ---------------------------------------------------------------------------

/// One player as handed to the core process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPlayer {
    pub name: String,
    pub id: PlayerId,
    pub decklist: Vec<String>,
}

/// Everything needed to launch the core for a room whose players are both
/// ready. Seat order is preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchPlan {
    pub port: u16,
    /// Distinguishes this launch from earlier ones on the same port.
    pub serial: u64,
    pub players: [PlannedPlayer; 2],
    /// Only `true` if both players asked for an unshuffled deck.
    pub noshuffle: bool,
}

impl MatchPlan {
    pub fn key(&self) -> MatchKey {
        MatchKey {
            port: self.port,
            serial: self.serial,
        }
    }
}
