//! Unified error type for the lobby server.

use cardlobby_core::{CatalogError, LaunchError};
use cardlobby_protocol::ProtocolError;
use cardlobby_room::RoomError;
use cardlobby_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A packet that does not decode or is not allowed here.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A registry error that was not turned into a client response.
    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use cardlobby_protocol::PacketType;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let lobby_err: LobbyError = err.into();
        assert!(matches!(lobby_err, LobbyError::Transport(_)));
        assert!(lobby_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::UnexpectedPacket(PacketType::CreateRequest);
        let lobby_err: LobbyError = err.into();
        assert!(matches!(lobby_err, LobbyError::Protocol(_)));
    }

    #[test]
    fn test_from_room_error_keeps_client_reason() {
        let lobby_err: LobbyError = RoomError::NameTaken.into();
        assert_eq!(lobby_err.to_string(), "name already in use");
    }

    #[test]
    fn test_from_launch_error() {
        let lobby_err: LobbyError = LaunchError::CoreExited.into();
        assert!(matches!(lobby_err, LobbyError::Launch(_)));
    }
}
