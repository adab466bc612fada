//! Connection tasks and the events they feed into the lobby loop.
//!
//! Sockets are read and written by small tasks; the lobby loop owns all
//! state and only ever sees [`LobbyEvent`]s. Each connection has:
//!
//! - a first-packet task, which reads exactly one packet under the packet
//!   timeout and hands the connection to the loop;
//! - a writer task, fed through a [`PlayerSender`], which exits once every
//!   sender is dropped or a write fails;
//! - a reader task, only while the connection is attached to a seat.
//!
//! A failed write is reported to the loop like a failed read, so the seat
//! is released either way.

use std::time::Duration;

use cardlobby_protocol::{ConnectionId, JsonCodec, RawPacket, ServerPacket};
use cardlobby_room::PlayerSender;
use cardlobby_transport::{PacketReader, PacketWriter, TcpConnection, TransportError};
use tokio::sync::{mpsc, oneshot};

/// Something that happened on a connection.
#[derive(Debug)]
pub(crate) enum LobbyEvent {
    /// The first packet of a new connection.
    Incoming {
        conn: TcpConnection,
        packet: RawPacket,
    },
    /// A packet from a connection attached to a seat.
    Packet {
        conn_id: ConnectionId,
        packet: RawPacket,
    },
    /// An attached connection closed or broke.
    Disconnected {
        conn_id: ConnectionId,
        error: TransportError,
    },
}

pub(crate) type EventSender = mpsc::UnboundedSender<LobbyEvent>;

/// Why a writer task stopped.
#[derive(Debug)]
pub(crate) enum WriterExit {
    /// Every sender was dropped, so the lobby no longer holds the
    /// connection.
    Released,
    /// A write failed or timed out while the lobby still held it.
    Failed(TransportError),
}

/// Reads the first packet of `conn` and forwards it to the loop.
pub(crate) fn spawn_first_packet(conn: TcpConnection, timeout: Duration, events: EventSender) {
    tokio::spawn(async move {
        let mut conn = conn;
        let conn_id = conn.id();
        let result = match tokio::time::timeout(timeout, conn.recv_packet()).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(timeout)),
        };
        match result {
            Ok(packet) => {
                tracing::debug!(%conn_id, kind = %packet.kind, "first packet received");
                let _ = events.send(LobbyEvent::Incoming { conn, packet });
            }
            Err(e) => tracing::debug!(%conn_id, error = %e, "dropping connection before first packet"),
        }
    });
}

/// Starts the writer task for a connection.
///
/// Returns the sender feeding it and a receiver that resolves with the
/// reason once the writer has finished, which tells an attached reader to
/// stop.
pub(crate) fn spawn_writer(
    mut writer: PacketWriter,
    write_timeout: Duration,
) -> (PlayerSender, oneshot::Receiver<WriterExit>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerPacket>();
    let (done_tx, done_rx) = oneshot::channel();

    tokio::spawn(async move {
        let conn_id = writer.id();
        let mut exit = WriterExit::Released;
        while let Some(packet) = rx.recv().await {
            let kind = packet.kind();
            if let Err(e) = write_one(&mut writer, &packet, write_timeout).await {
                tracing::debug!(%conn_id, %kind, error = %e, "write failed, closing");
                exit = WriterExit::Failed(e);
                break;
            }
            tracing::debug!(%conn_id, %kind, "packet sent");
        }
        match tokio::time::timeout(write_timeout, writer.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(%conn_id, error = %e, "shutdown failed"),
            Err(_) => tracing::debug!(%conn_id, "shutdown timed out"),
        }
        let _ = done_tx.send(exit);
    });

    (tx, done_rx)
}

async fn write_one(
    writer: &mut PacketWriter,
    packet: &ServerPacket,
    write_timeout: Duration,
) -> Result<(), TransportError> {
    let raw = packet.encode(&JsonCodec)?;
    tokio::time::timeout(write_timeout, writer.send_packet(&raw))
        .await
        .map_err(|_| TransportError::Timeout(write_timeout))?
}

/// Starts the reader task for a connection attached to a seat.
///
/// Packets and the final disconnect go to the loop. When the writer
/// stops, the reader stops too; a failed write is reported as the
/// disconnect.
pub(crate) fn spawn_reader(
    mut reader: PacketReader,
    body_timeout: Duration,
    mut writer_done: oneshot::Receiver<WriterExit>,
    events: EventSender,
) {
    tokio::spawn(async move {
        let conn_id = reader.id();
        loop {
            tokio::select! {
                result = reader.recv_packet(body_timeout) => match result {
                    Ok(packet) => {
                        if events.send(LobbyEvent::Packet { conn_id, packet }).is_err() {
                            break;
                        }
                    }
                    Err(error) => {
                        let _ = events.send(LobbyEvent::Disconnected { conn_id, error });
                        break;
                    }
                },
                exit = &mut writer_done => {
                    if let Ok(WriterExit::Failed(error)) = exit {
                        let _ = events.send(LobbyEvent::Disconnected { conn_id, error });
                    }
                    break;
                }
            }
        }
        tracing::debug!(%conn_id, "reader stopped");
    });
}
