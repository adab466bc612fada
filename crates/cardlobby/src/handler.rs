//! Packet dispatch.
//!
//! [`Lobby`] is the state owned by the dispatch loop: the registry, the
//! launcher and the catalog. Every packet is handled to completion before
//! the next one is looked at, so registry transitions never interleave.
//!
//! Replies always go out on the connection the request came from. A fresh
//! connection may send any request; a connection attached to a seat may
//! only send `Leave` and `Start`.

use cardlobby_core::{CardCatalog, Launcher};
use cardlobby_protocol::{
    Ack, ClientPacket, ConnectionId, JsonCodec, ProtocolError, RawPacket,
    RoomsResponse, ServerPacket, StartRequest, StartResponse,
};
use cardlobby_room::{MatchKey, MatchPlan, PlayerLink, PlayerSender, RoomError, RoomRegistry};
use tokio::sync::mpsc;

use crate::LobbyError;

pub(crate) struct Lobby<L: Launcher> {
    pub(crate) registry: RoomRegistry<L::Core>,
    pub(crate) launcher: L,
    pub(crate) catalog: CardCatalog,
    /// Cloned into every launched core's exit watcher.
    pub(crate) exits: mpsc::UnboundedSender<MatchKey>,
}

impl<L: Launcher> Lobby<L> {
    /// Handles the first packet of a connection that is not attached to a
    /// seat. `origin` feeds the connection's writer.
    pub(crate) async fn handle_fresh(
        &mut self,
        conn_id: ConnectionId,
        origin: &PlayerSender,
        raw: &RawPacket,
    ) -> Result<(), LobbyError> {
        let packet = ClientPacket::decode(&JsonCodec, raw)?;
        tracing::debug!(%conn_id, kind = %packet.kind(), name = ?packet.player_name(), "request");

        match packet {
            ClientPacket::Create(req) => {
                let link = PlayerLink::new(conn_id, origin.clone());
                let ack = match self.registry.create(&req.name, link) {
                    Ok(_port) => Ack::ok(),
                    Err(e) => rejected(&req.name, e),
                };
                reply(origin, ServerPacket::Create(ack));
            }
            ClientPacket::Join(req) => {
                let link = PlayerLink::new(conn_id, origin.clone());
                let ack = match self.registry.join(&req.name, &req.target_name, link) {
                    Ok(_port) => Ack::ok(),
                    Err(e) => rejected(&req.name, e),
                };
                reply(origin, ServerPacket::Join(ack));
            }
            ClientPacket::Leave(req) => self.leave(conn_id, origin, &req.name),
            ClientPacket::Rooms(_) => {
                // An inconsistent registry is a lobby bug; the client gets
                // no answer rather than a wrong one.
                let rooms = self.registry.list_rooms().inspect_err(|e| {
                    tracing::error!(%conn_id, error = %e, "cannot list rooms");
                })?;
                reply(origin, ServerPacket::Rooms(RoomsResponse { rooms }));
            }
            ClientPacket::Start(req) => self.start(conn_id, origin, req).await,
            ClientPacket::AdditionalCards(_) => {
                let catalog = match self.catalog.load().await {
                    Ok(catalog) => catalog,
                    Err(e) => {
                        tracing::error!(error = %e, "additional cards unavailable");
                        Default::default()
                    }
                };
                reply(origin, ServerPacket::AdditionalCards(catalog));
            }
        }
        Ok(())
    }

    /// Handles a packet from a connection attached to a seat.
    ///
    /// # Errors
    /// A decode failure or a request kind other than `Leave`/`Start` is a
    /// protocol error; the caller then drops the connection.
    pub(crate) async fn handle_attached(
        &mut self,
        conn_id: ConnectionId,
        raw: &RawPacket,
    ) -> Result<(), LobbyError> {
        let Some(origin) = self.registry.link_on(conn_id).map(|l| l.sender.clone()) else {
            // Released while the packet was in flight.
            tracing::debug!(%conn_id, "packet from released connection ignored");
            return Ok(());
        };
        let packet = ClientPacket::decode(&JsonCodec, raw)?;
        tracing::debug!(%conn_id, kind = %packet.kind(), name = ?packet.player_name(), "seat request");

        match packet {
            ClientPacket::Leave(req) => self.leave(conn_id, &origin, &req.name),
            ClientPacket::Start(req) => self.start(conn_id, &origin, req).await,
            other => return Err(ProtocolError::UnexpectedPacket(other.kind()).into()),
        }
        Ok(())
    }

    /// Treats a lost or misbehaving attached connection as a leave.
    pub(crate) fn drop_connection(&mut self, conn_id: ConnectionId) {
        if let Some(seat) = self.registry.disconnect(conn_id) {
            tracing::debug!(%conn_id, name = %seat.name(), "seat released");
        }
    }

    fn leave(&mut self, conn_id: ConnectionId, origin: &PlayerSender, name: &str) {
        let ack = match self.registry.leave(name, conn_id) {
            // Dropping the seat closes its connection once the reply below
            // is flushed, when `origin` is that same connection.
            Ok(_seat) => Ack::ok(),
            Err(e) => rejected(name, e),
        };
        reply(origin, ServerPacket::Leave(ack));
    }

    async fn start(&mut self, conn_id: ConnectionId, origin: &PlayerSender, req: StartRequest) {
        let link = PlayerLink::new(conn_id, origin.clone());
        match self
            .registry
            .start(&req.name, req.decklist, req.noshuffle, link)
        {
            Ok(plan) => self.launch(plan).await,
            Err(e @ RoomError::OpponentNotReady) => {
                reply(origin, ServerPacket::Start(StartResponse::waiting(e.to_string())));
            }
            Err(e) => {
                let reason = rejected(&req.name, e).reason.unwrap_or_default();
                reply(origin, ServerPacket::Start(StartResponse::failure(reason)));
            }
        }
    }

    /// Launches the core for `plan` and completes or fails the hand-off.
    /// Both players hear the outcome through their seats.
    async fn launch(&mut self, plan: MatchPlan) {
        let port = plan.port;
        tracing::info!(
            port,
            serial = plan.serial,
            first = %plan.players[0].name,
            second = %plan.players[1].name,
            "launching core"
        );

        match self.launcher.launch(&plan, self.exits.clone()).await {
            Ok(core) => {
                if let Err(e) = self.registry.hand_off(plan.key(), core) {
                    tracing::error!(port, error = %e, "hand-off failed");
                }
            }
            Err(e) => {
                tracing::error!(port, error = %e, "could not start core");
                self.registry.launch_failed(port, &e.to_string());
            }
        }
    }
}

/// Logs a recoverable registry error and turns it into a failed ack.
fn rejected(name: &str, e: RoomError) -> Ack {
    tracing::info!(%name, reason = %e, "request rejected");
    Ack::failed(e.to_string())
}

fn reply(origin: &PlayerSender, packet: ServerPacket) {
    if origin.send(packet).is_err() {
        tracing::debug!("reply to closed connection dropped");
    }
}
