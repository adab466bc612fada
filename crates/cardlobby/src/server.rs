//! `LobbyServer` builder and the dispatch loop.
//!
//! One task owns the whole lobby. It waits on four sources at once: new
//! connections, connection events, core exits and the housekeeping timer.
//! Socket I/O happens in per-connection tasks (see `connection`), so a
//! slow client never blocks the loop; the only long await inside the loop
//! is a core launch, which is bounded by the handshake timeout.

use std::future::Future;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use cardlobby_core::{CardCatalog, CoreLauncher, Launcher};
use cardlobby_room::{MatchKey, PortProbe, RoomRegistry};
use cardlobby_session::Seed;
use cardlobby_transport::{TcpConnection, TcpTransport};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::connection::{self, LobbyEvent};
use crate::handler::Lobby;
use crate::{LobbyConfig, LobbyError};

/// Builder for configuring and starting a lobby server.
///
/// # Example
///
/// ```rust,no_run
/// # async fn run() -> Result<(), cardlobby::LobbyError> {
/// use cardlobby::{LobbyConfig, LobbyServer};
///
/// let config = LobbyConfig::load("config.json".as_ref())?;
/// let server = LobbyServer::builder(config)
///     .bind_host("0.0.0.0")
///     .build_with_core()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct LobbyServerBuilder {
    config: LobbyConfig,
    bind_host: String,
    seed: Option<Seed>,
    probe: Option<Box<dyn PortProbe>>,
}

impl LobbyServerBuilder {
    pub fn new(config: LobbyConfig) -> Self {
        Self {
            config,
            bind_host: "0.0.0.0".to_string(),
            seed: None,
            probe: None,
        }
    }

    /// Sets the host to bind to. The port comes from the config.
    pub fn bind_host(mut self, host: &str) -> Self {
        self.bind_host = host.to_string();
        self
    }

    /// Uses a fixed identity seed instead of a random one.
    pub fn seed(mut self, seed: Seed) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Replaces the platform's port probe.
    pub fn port_probe(mut self, probe: Box<dyn PortProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Binds the listener and builds a server that launches cores with
    /// the configured binary.
    pub async fn build_with_core(self) -> Result<LobbyServer<CoreLauncher>, LobbyError> {
        let launcher = CoreLauncher::new(
            self.config.core_info.clone(),
            self.config.handshake_timeout(),
        );
        self.build(launcher).await
    }

    /// Binds the listener and builds a server around `launcher`.
    pub async fn build<L: Launcher>(self, launcher: L) -> Result<LobbyServer<L>, LobbyError> {
        let config = self.config;
        let transport =
            TcpTransport::bind((self.bind_host.as_str(), config.port)).await?;

        let registry = RoomRegistry::new(
            config.registry_config(),
            self.seed.unwrap_or_else(Seed::generate),
            self.probe.unwrap_or_else(cardlobby_room::ports::system_probe),
        );
        let catalog = CardCatalog::new(
            config.additional_cards_path.clone(),
            config.core_info.clone(),
            config.export_timeout(),
        );
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (exits_tx, exits_rx) = mpsc::unbounded_channel();

        Ok(LobbyServer {
            transport,
            lobby: Lobby {
                registry,
                launcher,
                catalog,
                exits: exits_tx,
            },
            events_tx,
            events_rx,
            exits_rx,
            packet_timeout: config.packet_timeout(),
            write_timeout: config.write_timeout(),
            housekeeping_interval: config.housekeeping_interval(),
        })
    }
}

/// A bound lobby server.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// serving.
pub struct LobbyServer<L: Launcher> {
    transport: TcpTransport,
    lobby: Lobby<L>,
    events_tx: connection::EventSender,
    events_rx: mpsc::UnboundedReceiver<LobbyEvent>,
    exits_rx: mpsc::UnboundedReceiver<MatchKey>,
    packet_timeout: Duration,
    write_timeout: Duration,
    housekeeping_interval: Duration,
}

impl LobbyServer<CoreLauncher> {
    /// Starts configuring a server. [`LobbyServerBuilder::build`] swaps in
    /// another [`Launcher`].
    pub fn builder(config: LobbyConfig) -> LobbyServerBuilder {
        LobbyServerBuilder::new(config)
    }
}

impl<L: Launcher> LobbyServer<L> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Serves until the process is terminated.
    pub async fn run(self) -> Result<(), LobbyError> {
        self.run_until(std::future::pending()).await
    }

    /// Serves until `shutdown` completes.
    ///
    /// On shutdown the listener is closed and every waiting room is
    /// dropped, which closes its players' connections. Running cores are
    /// separate processes and keep running.
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) -> Result<(), LobbyError> {
        let addr = self.local_addr().ok();
        tracing::info!(?addr, "lobby running");

        let mut housekeeping = tokio::time::interval(self.housekeeping_interval);
        housekeeping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            self.housekeep();

            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => connection::spawn_first_packet(
                        conn,
                        self.packet_timeout,
                        self.events_tx.clone(),
                    ),
                    Err(e) => tracing::error!(error = %e, "accept failed"),
                },
                // `events_tx` lives in `self`, so this never yields `None`.
                Some(event) = self.events_rx.recv() => self.handle_event(event).await,
                Some(key) = self.exits_rx.recv() => {
                    self.lobby.registry.mark_finished(key);
                }
                _ = housekeeping.tick() => {}
            }
        }

        let closed = self.lobby.registry.close_waiting();
        tracing::info!(closed_rooms = closed, running = self.lobby.registry.running().len(), "lobby shut down");
        Ok(())
    }

    fn housekeep(&mut self) {
        let reaped = self.lobby.registry.housekeeping(Instant::now());
        if reaped.rooms > 0 || reaped.matches > 0 {
            tracing::debug!(rooms = reaped.rooms, matches = reaped.matches, "housekeeping");
        }
    }

    async fn handle_event(&mut self, event: LobbyEvent) {
        match event {
            LobbyEvent::Incoming { conn, packet } => self.handle_incoming(conn, packet).await,
            LobbyEvent::Packet { conn_id, packet } => {
                if let Err(e) = self.lobby.handle_attached(conn_id, &packet).await {
                    tracing::warn!(%conn_id, error = %e, "dropping attached connection");
                    self.lobby.drop_connection(conn_id);
                }
            }
            LobbyEvent::Disconnected { conn_id, error } => {
                tracing::debug!(%conn_id, %error, "attached connection lost");
                self.lobby.drop_connection(conn_id);
            }
        }
    }

    /// Dispatches the first packet of a connection and keeps the
    /// connection only if it ended up attached to a seat.
    async fn handle_incoming(&mut self, conn: TcpConnection, packet: cardlobby_protocol::RawPacket) {
        let conn_id = conn.id();
        let (reader, writer) = conn.into_split();
        let (origin, writer_done) = connection::spawn_writer(writer, self.write_timeout);

        if let Err(e) = self.lobby.handle_fresh(conn_id, &origin, &packet).await {
            tracing::warn!(%conn_id, error = %e, "closing connection");
            return;
        }

        if self.lobby.registry.is_attached(conn_id) {
            tracing::debug!(%conn_id, "connection attached to seat");
            connection::spawn_reader(
                reader,
                self.packet_timeout,
                writer_done,
                self.events_tx.clone(),
            );
        }
    }
}
