//! The room registry: every waiting room plus every running match.
//!
//! The registry is synchronous and owned by exactly one task (the lobby's
//! dispatch loop), so no operation ever races another. Each method is one
//! complete transition; on error nothing has changed except where a method
//! documents otherwise.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use cardlobby_protocol::{
    ConnectionId, DECKLIST_LEN, OpponentChanged, ServerPacket, StartResponse,
};
use cardlobby_session::{Seed, validate_name};

use crate::ports::{self, PortProbe};
use crate::room::{MatchPlan, PlannedPlayer, PlayerLink, Room, Seat};
use crate::running::{CoreProcess, MatchKey, RunningMatch};
use crate::RoomError;

/// Tunables for a [`RoomRegistry`].
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Lowest port handed to a room.
    pub room_min_port: u16,
    /// Highest port handed to a room (inclusive).
    pub room_max_port: u16,
    /// Age after which a waiting room or a running match is reaped.
    pub abandon_after: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            room_min_port: 37042,
            room_max_port: 39942,
            abandon_after: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// What a [`RoomRegistry::housekeeping`] pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reaped {
    pub rooms: usize,
    pub matches: usize,
}

/// Waiting rooms and running matches of one lobby process.
pub struct RoomRegistry<C> {
    config: RegistryConfig,
    seed: Seed,
    probe: Box<dyn PortProbe>,
    rooms: Vec<Room>,
    running: Vec<RunningMatch<C>>,
    /// Serial of the most recent launch plan.
    last_serial: u64,
}

impl<C: CoreProcess> RoomRegistry<C> {
    pub fn new(config: RegistryConfig, seed: Seed, probe: Box<dyn PortProbe>) -> Self {
        Self {
            config,
            seed,
            probe,
            rooms: Vec::new(),
            running: Vec::new(),
            last_serial: 0,
        }
    }

    // -- Queries ----------------------------------------------------------

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn running(&self) -> &[RunningMatch<C>] {
        &self.running
    }

    /// The waiting room `name` is seated in.
    pub fn room_of(&self, name: &str) -> Option<&Room> {
        self.rooms.iter().find(|r| r.has_player(name))
    }

    /// Returns `true` if a waiting or running player already uses `name`.
    pub fn name_in_use(&self, name: &str) -> bool {
        self.rooms.iter().any(|r| r.has_player(name))
            || self
                .running
                .iter()
                .any(|m| m.names.iter().any(|n| n == name))
    }

    /// Returns `true` if `connection` is some seat's connection.
    pub fn is_attached(&self, connection: ConnectionId) -> bool {
        self.link_on(connection).is_some()
    }

    pub fn link_on(&self, connection: ConnectionId) -> Option<&PlayerLink> {
        self.seat_on(connection).map(Seat::link)
    }

    /// Host names of every room that is still looking for players.
    ///
    /// # Errors
    /// [`RoomError::InvariantViolation`] if a room has no occupant at all.
    pub fn list_rooms(&self) -> Result<Vec<String>, RoomError> {
        let mut names = Vec::with_capacity(self.rooms.len());
        for room in &self.rooms {
            let host = room.host_name().ok_or_else(|| {
                RoomError::InvariantViolation(format!(
                    "room on port {} has no players",
                    room.port
                ))
            })?;
            if room.state().is_listed() {
                names.push(host.to_owned());
            }
        }
        Ok(names)
    }

    // -- Transitions ------------------------------------------------------

    /// Opens a room hosted by `name` and returns its port.
    pub fn create(&mut self, name: &str, link: PlayerLink) -> Result<u16, RoomError> {
        self.check_new_name(name)?;
        let port = self.allocate_port()?;
        let id = self.seed.derive_id(name);
        let conn_id = link.connection;

        self.rooms
            .push(Room::new(port, Seat::new(name.to_owned(), id, link)));
        tracing::info!(%name, port, %conn_id, "room created");
        Ok(port)
    }

    /// Seats `name` in the room hosted by `target` and tells the host.
    /// Returns the room's port.
    pub fn join(
        &mut self,
        name: &str,
        target: &str,
        link: PlayerLink,
    ) -> Result<u16, RoomError> {
        self.check_new_name(name)?;
        let id = self.seed.derive_id(name);

        let room = self
            .rooms
            .iter_mut()
            .find(|r| r.host_name() == Some(target))
            .ok_or(RoomError::NoSuchRoom)?;
        let index = room
            .seats
            .iter()
            .position(Option::is_none)
            .ok_or(RoomError::RoomFull)?;

        if let Some(host) = room.seat(1 - index) {
            host.link.push(ServerPacket::OpponentChanged(OpponentChanged {
                name: Some(name.to_owned()),
            }));
        }
        let conn_id = link.connection;
        room.seats[index] = Some(Seat::new(name.to_owned(), id, link));
        tracing::info!(%name, host = %target, port = room.port, %conn_id, "player joined");
        Ok(room.port)
    }

    /// Frees the seat of `name`, requested over `origin`.
    ///
    /// The removed seat is returned; dropping it closes its connection.
    /// An emptied room is removed, otherwise the remaining occupant is told
    /// their opponent left.
    pub fn leave(&mut self, name: &str, origin: ConnectionId) -> Result<Seat, RoomError> {
        self.check_seat_owner(name, origin)?;
        let (room, seat) = self.locate(name).ok_or(RoomError::NotInAnyRoom)?;
        let seat = self.vacate(room, seat).ok_or(RoomError::NotInAnyRoom)?;
        tracing::info!(%name, "player left");
        Ok(seat)
    }

    /// Treats a lost connection like a leave by its seat's player.
    pub fn disconnect(&mut self, connection: ConnectionId) -> Option<Seat> {
        let (room, seat) = self.rooms.iter().enumerate().find_map(|(ri, room)| {
            room.seat_index_on(connection).map(|si| (ri, si))
        })?;
        let seat = self.vacate(room, seat)?;
        tracing::info!(name = %seat.name, conn_id = %connection, "player disconnected");
        Some(seat)
    }

    /// Records `name` as ready with the given deck.
    ///
    /// When the request arrives on a connection other than the seat's own,
    /// the seat is rebound to `origin` and the old connection is closed.
    /// Returns the launch plan once both players are ready; until then it
    /// fails with [`RoomError::OpponentNotReady`] after recording the
    /// ready flag.
    ///
    /// Checks run in this order: deck size, seat ownership, seat lookup,
    /// opponent presence.
    pub fn start(
        &mut self,
        name: &str,
        decklist: Vec<String>,
        noshuffle: bool,
        origin: PlayerLink,
    ) -> Result<MatchPlan, RoomError> {
        if decklist.len() != DECKLIST_LEN {
            return Err(RoomError::WrongDeckSize {
                expected: DECKLIST_LEN,
                actual: decklist.len(),
            });
        }
        self.check_seat_owner(name, origin.connection)?;
        let (ri, si) = self.locate(name).ok_or(RoomError::NotInAnyRoom)?;
        let room = &mut self.rooms[ri];
        if room.seat(1 - si).is_none() {
            return Err(RoomError::NoOpponent);
        }

        let port = room.port;
        let seat = room.seats[si]
            .as_mut()
            .ok_or(RoomError::NotInAnyRoom)?;
        if seat.link.connection != origin.connection {
            tracing::info!(
                %name,
                old = %seat.link.connection,
                new = %origin.connection,
                "seat rebound to new connection"
            );
            seat.link = origin;
        }
        seat.ready = true;
        seat.noshuffle = noshuffle;
        seat.decklist = decklist;
        tracing::info!(%name, port, "player ready");

        let plan = plan_for(room, self.last_serial + 1).ok_or(RoomError::OpponentNotReady)?;
        self.last_serial = plan.serial;
        Ok(plan)
    }

    /// Completes a successful launch: both players receive their ID and
    /// the port, their connections are closed, and the room becomes a
    /// running match.
    ///
    /// If the room vanished the core is killed, since nobody can reach it.
    pub fn hand_off(&mut self, key: MatchKey, mut core: C) -> Result<(), RoomError> {
        let port = key.port;
        let Some(index) = self.rooms.iter().position(|r| r.port == port) else {
            core.kill();
            return Err(RoomError::InvariantViolation(format!(
                "no room on port {port} to hand off"
            )));
        };
        let room = self.rooms.remove(index);
        let [Some(first), Some(second)] = room.seats else {
            core.kill();
            return Err(RoomError::InvariantViolation(format!(
                "room on port {port} lost a player during launch"
            )));
        };

        for seat in [&first, &second] {
            seat.link.push(ServerPacket::Start(StartResponse::success(
                seat.id.clone(),
                port,
            )));
        }
        tracing::info!(
            port,
            first = %first.name,
            second = %second.name,
            "match handed off to core"
        );
        self.running.push(RunningMatch {
            port,
            serial: key.serial,
            names: [first.name, second.name],
            started_at: Instant::now(),
            finished: false,
            core,
        });
        Ok(())
    }

    /// Reports a failed launch to both players. The room keeps its ready
    /// flags so either player can retry with another start request.
    pub fn launch_failed(&mut self, port: u16, reason: &str) {
        let Some(room) = self.rooms.iter().find(|r| r.port == port) else {
            return;
        };
        for seat in room.seats() {
            seat.link.push(ServerPacket::Start(StartResponse::failure(format!(
                "could not start the core: {reason}"
            ))));
        }
    }

    /// Flags the match launched as `key` as finished. Returns `false` if
    /// no running match has that key, which includes a stale exit for a
    /// port that has since been reused.
    pub fn mark_finished(&mut self, key: MatchKey) -> bool {
        match self.running.iter_mut().find(|m| m.key() == key) {
            Some(m) => {
                m.finished = true;
                tracing::debug!(port = key.port, serial = key.serial, "core exit recorded");
                true
            }
            None => {
                tracing::debug!(port = key.port, serial = key.serial, "exit of unknown match ignored");
                false
            }
        }
    }

    /// Removes abandoned rooms and finished or abandoned matches.
    ///
    /// A match is finished when its exit was recorded or its core reports
    /// having exited. Cores of abandoned matches are killed.
    pub fn housekeeping(&mut self, now: Instant) -> Reaped {
        let abandon_after = self.config.abandon_after;
        let mut reaped = Reaped::default();

        self.rooms.retain(|room| {
            let keep = now.saturating_duration_since(room.created_at) < abandon_after;
            if !keep {
                tracing::info!(port = room.port, host = ?room.host_name(), "abandoned room removed");
                reaped.rooms += 1;
            }
            keep
        });

        self.running.retain_mut(|m| {
            let expired = now.saturating_duration_since(m.started_at) >= abandon_after;
            if !m.is_finished() && !expired {
                return true;
            }
            if !m.core.has_exited() {
                tracing::warn!(port = m.port, "killing core of abandoned match");
                m.core.kill();
            }
            tracing::info!(port = m.port, "match reaped");
            reaped.matches += 1;
            false
        });

        reaped
    }

    /// Drops every waiting room, closing their connections. Running
    /// matches are left alone.
    pub fn close_waiting(&mut self) -> usize {
        let count = self.rooms.len();
        self.rooms.clear();
        count
    }

    // -- Helpers ----------------------------------------------------------

    fn check_new_name(&self, name: &str) -> Result<(), RoomError> {
        validate_name(name)?;
        if self.name_in_use(name) {
            return Err(RoomError::NameTaken);
        }
        Ok(())
    }

    /// A connection attached to a seat may only act for that seat.
    fn check_seat_owner(&self, name: &str, origin: ConnectionId) -> Result<(), RoomError> {
        match self.seat_on(origin) {
            Some(seat) if seat.name != name => Err(RoomError::NotYourSeat),
            _ => Ok(()),
        }
    }

    fn seat_on(&self, connection: ConnectionId) -> Option<&Seat> {
        self.rooms.iter().find_map(|room| {
            room.seat_index_on(connection)
                .and_then(|index| room.seat(index))
        })
    }

    fn locate(&self, name: &str) -> Option<(usize, usize)> {
        self.rooms
            .iter()
            .enumerate()
            .find_map(|(ri, room)| room.seat_index_of(name).map(|si| (ri, si)))
    }

    fn vacate(&mut self, room_index: usize, seat_index: usize) -> Option<Seat> {
        let room = self.rooms.get_mut(room_index)?;
        let seat = room.vacate(seat_index)?;
        if room.is_empty() {
            let room = self.rooms.remove(room_index);
            tracing::info!(port = room.port, "empty room removed");
        }
        Some(seat)
    }

    fn allocate_port(&self) -> Result<u16, RoomError> {
        let claimed: HashSet<u16> = self
            .rooms
            .iter()
            .map(|r| r.port)
            .chain(self.running.iter().map(|m| m.port))
            .collect();
        let active = self.probe.active_ports();
        ports::allocate(
            self.config.room_min_port,
            self.config.room_max_port,
            &claimed,
            &active,
        )
        .inspect_err(|_| {
            tracing::warn!(
                min = self.config.room_min_port,
                max = self.config.room_max_port,
                "no free room port"
            );
        })
    }
}

fn plan_for(room: &Room, serial: u64) -> Option<MatchPlan> {
    let [Some(first), Some(second)] = &room.seats else {
        return None;
    };
    if !(first.ready && second.ready) {
        return None;
    }
    let planned = |seat: &Seat| PlannedPlayer {
        name: seat.name.clone(),
        id: seat.id.clone(),
        decklist: seat.decklist.clone(),
    };
    Some(MatchPlan {
        port: room.port,
        serial,
        players: [planned(first), planned(second)],
        noshuffle: first.noshuffle && second.noshuffle,
    })
}
