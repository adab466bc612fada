//! Player identity for the card lobby.
//!
//! A player is known to the lobby only by a display name. This crate
//! decides which names are acceptable ([`validate_name`]) and turns an
//! accepted name into the opaque [`PlayerId`](cardlobby_protocol::PlayerId)
//! the player presents to the core process ([`Seed::derive_id`]).
//!
//! ```text
//! Room registry (above)  ← validates names, derives IDs on registration
//!     ↕
//! Session layer (this crate)
//!     ↕
//! Protocol layer (below)  ← provides PlayerId and NAME_SEPARATOR
//! ```

mod error;
mod identity;
mod name;

pub use error::SessionError;
pub use identity::Seed;
pub use name::validate_name;
