//! # Cardlobby
//!
//! Matchmaking lobby for a two-player card game.
//!
//! Players connect over TCP, create or join a two-seat room, and submit
//! their decks. Once both seats are ready the lobby launches a dedicated
//! core process on a free port and tells both players where to connect.
//! The lobby never relays game traffic itself.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cardlobby::prelude::*;
//!
//! # async fn run() -> Result<(), LobbyError> {
//! let config = LobbyConfig::load("config.json".as_ref())?;
//! let server = LobbyServer::builder(config).build_with_core().await?;
//! server.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! })
//! .await
//! # }
//! ```

mod config;
mod connection;
mod error;
mod handler;
mod server;

pub use config::{ConfigError, LobbyConfig, PlatformConfig};
pub use error::LobbyError;
pub use server::{LobbyServer, LobbyServerBuilder};

/// Re-exports for lobby binaries and tests.
pub mod prelude {
    pub use crate::{LobbyConfig, LobbyError, LobbyServer, LobbyServerBuilder};
    pub use cardlobby_core::{CoreInfo, CoreLauncher, LaunchError, Launcher};
    pub use cardlobby_protocol::{
        Ack, ClientPacket, ConnectionId, PlayerId, ServerPacket, StartResponse, StartResult,
    };
    pub use cardlobby_room::{CoreProcess, MatchKey, MatchPlan, NoProbe, PortProbe, RoomError};
    pub use cardlobby_session::Seed;
    pub use cardlobby_transport::{TcpConnection, TcpTransport};
}
