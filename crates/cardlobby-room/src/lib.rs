//! Room registry for the card lobby.
//!
//! A room is created by its host, joined by one opponent, and started once
//! both players have submitted a deck. At that point the lobby launches a
//! core process for the pair and the room becomes a running match, which
//! is only tracked until its core exits.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: all waiting rooms and running matches
//! - [`Room`] and [`Seat`]: a waiting room and its player slots
//! - [`RoomState`]: derived lifecycle state of a waiting room
//! - [`MatchPlan`]: what the launcher needs to start a core
//! - [`CoreProcess`]: the registry's view of a spawned core
//! - [`PortProbe`]: the OS side of port allocation

mod error;
pub mod ports;
mod registry;
mod room;
mod running;

pub use error::RoomError;
pub use ports::{NoProbe, PortProbe, ProcNetTcp};
pub use registry::{Reaped, RegistryConfig, RoomRegistry};
pub use room::{MatchPlan, PlannedPlayer, PlayerLink, PlayerSender, Room, RoomState, Seat};
pub use running::{CoreProcess, MatchKey, RunningMatch};
