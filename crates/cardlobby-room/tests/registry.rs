//! Integration tests for the room registry using a fake core process.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use cardlobby_protocol::{
    ConnectionId, DECKLIST_LEN, OpponentChanged, ServerPacket, StartResult,
};
use cardlobby_room::{
    CoreProcess, MatchKey, NoProbe, PlayerLink, PortProbe, RegistryConfig, RoomError,
    RoomRegistry, RoomState,
};
use cardlobby_session::{Seed, SessionError};
use tokio::sync::mpsc;

// =========================================================================
// Test doubles
// =========================================================================

#[derive(Debug, Clone, Default)]
struct FakeCore {
    exited: Arc<AtomicBool>,
    killed: Arc<AtomicBool>,
}

impl CoreProcess for FakeCore {
    fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    fn kill(&mut self) {
        self.killed.store(true, Ordering::SeqCst);
        self.exited.store(true, Ordering::SeqCst);
    }
}

struct BusyPorts(HashSet<u16>);

impl PortProbe for BusyPorts {
    fn active_ports(&self) -> HashSet<u16> {
        self.0.clone()
    }
}

type Inbox = mpsc::UnboundedReceiver<ServerPacket>;

/// Creates a link on a fresh connection ID and the receiving end of its
/// outbound channel.
fn link(conn: u64) -> (PlayerLink, Inbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PlayerLink::new(ConnectionId::new(conn), tx), rx)
}

fn registry() -> RoomRegistry<FakeCore> {
    registry_with(RegistryConfig {
        room_min_port: 40000,
        room_max_port: 40009,
        ..RegistryConfig::default()
    })
}

fn registry_with(config: RegistryConfig) -> RoomRegistry<FakeCore> {
    RoomRegistry::new(config, Seed::from_bytes([3; 32]), Box::new(NoProbe))
}

fn deck() -> Vec<String> {
    (0..DECKLIST_LEN).map(|i| format!("card{i}")).collect()
}

/// Alice hosts on connection 1, Bob joins on connection 2.
fn paired(reg: &mut RoomRegistry<FakeCore>) -> (Inbox, Inbox) {
    let (alice, alice_rx) = link(1);
    let (bob, bob_rx) = link(2);
    reg.create("Alice", alice).unwrap();
    reg.join("Bob", "Alice", bob).unwrap();
    (alice_rx, bob_rx)
}

fn origin(reg: &RoomRegistry<FakeCore>, conn: u64) -> PlayerLink {
    reg.link_on(ConnectionId::new(conn)).unwrap().clone()
}

// =========================================================================
// create / join
// =========================================================================

#[test]
fn test_create_then_join_fills_both_seats_with_distinct_ids() {
    let mut reg = registry();
    let (mut alice_rx, _bob_rx) = paired(&mut reg);

    let room = reg.room_of("Alice").unwrap();
    assert_eq!(room.state(), RoomState::Paired);
    let first = room.seat(0).unwrap();
    let second = room.seat(1).unwrap();
    assert_eq!(first.name(), "Alice");
    assert_eq!(second.name(), "Bob");
    assert_ne!(first.id(), second.id());

    assert_eq!(
        alice_rx.try_recv().unwrap(),
        ServerPacket::OpponentChanged(OpponentChanged {
            name: Some("Bob".into())
        })
    );
}

#[test]
fn test_ids_are_stable_for_the_same_seed() {
    let mut reg = registry();
    let (alice, _rx) = link(1);
    reg.create("Alice", alice).unwrap();
    let id = reg.room_of("Alice").unwrap().seat(0).unwrap().id().clone();

    reg.leave("Alice", ConnectionId::new(1)).unwrap();
    let (alice, _rx) = link(3);
    reg.create("Alice", alice).unwrap();
    assert_eq!(reg.room_of("Alice").unwrap().seat(0).unwrap().id(), &id);
}

#[test]
fn test_create_same_name_twice_is_name_taken() {
    let mut reg = registry();
    let (a1, _r1) = link(1);
    let (a2, _r2) = link(2);
    reg.create("Alice", a1).unwrap();

    let err = reg.create("Alice", a2).unwrap_err();
    assert_eq!(err, RoomError::NameTaken);
    assert_eq!(err.to_string(), "name already in use");
    assert_eq!(reg.rooms().len(), 1);
}

#[test]
fn test_join_with_taken_name_is_rejected() {
    let mut reg = registry();
    let (a, _ra) = link(1);
    let (b, _rb) = link(2);
    reg.create("Alice", a).unwrap();
    assert_eq!(reg.join("Alice", "Alice", b), Err(RoomError::NameTaken));
}

#[test]
fn test_separator_in_name_is_rejected_by_create_and_join() {
    let mut reg = registry();
    let (a, _ra) = link(1);
    assert_eq!(
        reg.create("Aliµce", a),
        Err(RoomError::InvalidName(SessionError::ForbiddenCharacter))
    );

    let (host, _rh) = link(2);
    reg.create("Host", host).unwrap();
    let (b, _rb) = link(3);
    assert_eq!(
        reg.join("µ", "Host", b),
        Err(RoomError::InvalidName(SessionError::ForbiddenCharacter))
    );
}

#[test]
fn test_empty_name_is_rejected() {
    let mut reg = registry();
    let (a, _ra) = link(1);
    assert_eq!(
        reg.create("", a),
        Err(RoomError::InvalidName(SessionError::EmptyName))
    );
}

#[test]
fn test_join_unknown_host_is_no_such_room() {
    let mut reg = registry();
    let (b, _rb) = link(1);
    assert_eq!(reg.join("Bob", "Nobody", b), Err(RoomError::NoSuchRoom));
}

#[test]
fn test_join_full_room_is_rejected() {
    let mut reg = registry();
    let _inboxes = paired(&mut reg);
    let (c, _rc) = link(3);
    assert_eq!(reg.join("Carol", "Alice", c), Err(RoomError::RoomFull));
}

#[test]
fn test_join_matches_second_seat_once_host_left() {
    let mut reg = registry();
    let _inboxes = paired(&mut reg);
    reg.leave("Alice", ConnectionId::new(1)).unwrap();

    let (c, _rc) = link(3);
    reg.join("Carol", "Bob", c).unwrap();
    let room = reg.room_of("Bob").unwrap();
    assert_eq!(room.seat(0).unwrap().name(), "Carol");
    assert_eq!(room.seat(1).unwrap().name(), "Bob");
}

// =========================================================================
// Ports
// =========================================================================

#[test]
fn test_ports_are_allocated_low_to_high_and_never_shared() {
    let mut reg = registry();
    let mut ports = Vec::new();
    for (i, name) in ["A", "B", "C"].iter().enumerate() {
        let (l, _r) = link(i as u64);
        ports.push(reg.create(name, l).unwrap());
    }
    assert_eq!(ports, vec![40000, 40001, 40002]);

    // A freed port is handed out again.
    reg.leave("B", ConnectionId::new(1)).unwrap();
    let (l, _r) = link(9);
    assert_eq!(reg.create("D", l).unwrap(), 40001);
}

#[test]
fn test_ports_busy_on_the_host_are_skipped() {
    let mut reg: RoomRegistry<FakeCore> = RoomRegistry::new(
        RegistryConfig {
            room_min_port: 40000,
            room_max_port: 40002,
            ..RegistryConfig::default()
        },
        Seed::generate(),
        Box::new(BusyPorts(HashSet::from([40000, 40001]))),
    );
    let (a, _ra) = link(1);
    assert_eq!(reg.create("Alice", a).unwrap(), 40002);

    let (b, _rb) = link(2);
    assert_eq!(reg.create("Bob", b), Err(RoomError::NoFreePort));
    assert!(!reg.name_in_use("Bob"));
}

#[test]
fn test_running_match_keeps_its_port_and_names() {
    let mut reg = registry_with(RegistryConfig {
        room_min_port: 40000,
        room_max_port: 40000,
        ..RegistryConfig::default()
    });
    let _inboxes = paired(&mut reg);
    let _ = reg.start("Alice", deck(), false, origin(&reg, 1));
    let plan = reg.start("Bob", deck(), false, origin(&reg, 2)).unwrap();
    reg.hand_off(plan.key(), FakeCore::default()).unwrap();

    let (c, _rc) = link(3);
    assert_eq!(reg.create("Carol", c), Err(RoomError::NoFreePort));
    let (a, _ra) = link(4);
    assert_eq!(reg.create("Alice", a), Err(RoomError::NameTaken));
}

// =========================================================================
// leave / disconnect
// =========================================================================

#[test]
fn test_leave_last_player_removes_room() {
    let mut reg = registry();
    let (a, _ra) = link(1);
    reg.create("Alice", a).unwrap();

    let seat = reg.leave("Alice", ConnectionId::new(1)).unwrap();
    assert_eq!(seat.name(), "Alice");
    assert!(reg.rooms().is_empty());
    assert!(!reg.name_in_use("Alice"));
}

#[test]
fn test_leave_one_of_two_keeps_room_and_notifies_other() {
    let mut reg = registry();
    let (mut alice_rx, _bob_rx) = paired(&mut reg);
    let _joined = alice_rx.try_recv().unwrap();

    reg.leave("Bob", ConnectionId::new(2)).unwrap();
    let room = reg.room_of("Alice").unwrap();
    assert_eq!(room.state(), RoomState::Forming);
    assert_eq!(
        alice_rx.try_recv().unwrap(),
        ServerPacket::OpponentChanged(OpponentChanged { name: None })
    );
}

#[test]
fn test_leave_closes_the_leavers_channel() {
    let mut reg = registry();
    let (_alice_rx, mut bob_rx) = paired(&mut reg);

    drop(reg.leave("Bob", ConnectionId::new(2)).unwrap());
    assert!(matches!(
        bob_rx.try_recv(),
        Err(mpsc::error::TryRecvError::Disconnected)
    ));
}

#[test]
fn test_leave_unknown_player_is_not_in_any_room() {
    let mut reg = registry();
    assert_eq!(
        reg.leave("Ghost", ConnectionId::new(5)).unwrap_err(),
        RoomError::NotInAnyRoom
    );
}

#[test]
fn test_attached_connection_cannot_act_for_another_player() {
    let mut reg = registry();
    let _inboxes = paired(&mut reg);

    assert_eq!(
        reg.leave("Alice", ConnectionId::new(2)).unwrap_err(),
        RoomError::NotYourSeat
    );
    assert_eq!(
        reg.start("Alice", deck(), false, origin(&reg, 2)).unwrap_err(),
        RoomError::NotYourSeat
    );
    assert_eq!(reg.room_of("Alice").unwrap().state(), RoomState::Paired);
}

#[test]
fn test_fresh_connection_may_leave_by_name() {
    let mut reg = registry();
    let _inboxes = paired(&mut reg);
    reg.leave("Alice", ConnectionId::new(99)).unwrap();
    assert!(reg.room_of("Alice").is_none());
}

#[test]
fn test_disconnect_acts_like_leave() {
    let mut reg = registry();
    let (mut alice_rx, _bob_rx) = paired(&mut reg);
    let _joined = alice_rx.try_recv().unwrap();

    let seat = reg.disconnect(ConnectionId::new(2)).unwrap();
    assert_eq!(seat.name(), "Bob");
    assert!(!reg.is_attached(ConnectionId::new(2)));
    assert!(matches!(
        alice_rx.try_recv().unwrap(),
        ServerPacket::OpponentChanged(OpponentChanged { name: None })
    ));

    assert!(reg.disconnect(ConnectionId::new(2)).is_none());
}

// =========================================================================
// list_rooms
// =========================================================================

#[test]
fn test_list_rooms_excludes_rooms_with_both_players_ready() {
    let mut reg = registry();
    let _inboxes = paired(&mut reg);
    let (c, _rc) = link(3);
    reg.create("Carol", c).unwrap();

    assert_eq!(reg.list_rooms().unwrap(), vec!["Alice", "Carol"]);

    let _ = reg.start("Alice", deck(), false, origin(&reg, 1));
    assert_eq!(reg.list_rooms().unwrap(), vec!["Alice", "Carol"]);

    let _plan = reg.start("Bob", deck(), false, origin(&reg, 2)).unwrap();
    assert_eq!(reg.list_rooms().unwrap(), vec!["Carol"]);
}

// =========================================================================
// start / hand-off
// =========================================================================

#[test]
fn test_start_wrong_deck_size_is_rejected_regardless_of_state() {
    let mut reg = registry();
    let (stranger, _r) = link(7);
    let err = reg.start("Nobody", vec!["x".into()], false, stranger).unwrap_err();
    assert_eq!(
        err,
        RoomError::WrongDeckSize {
            expected: DECKLIST_LEN,
            actual: 1
        }
    );

    let _inboxes = paired(&mut reg);
    let mut long = deck();
    long.push("extra".into());
    assert!(matches!(
        reg.start("Alice", long, false, origin(&reg, 1)),
        Err(RoomError::WrongDeckSize { .. })
    ));
    assert!(!reg.room_of("Alice").unwrap().seat(0).unwrap().is_ready());
}

#[test]
fn test_start_without_opponent_does_not_mark_ready() {
    let mut reg = registry();
    let (a, _ra) = link(1);
    reg.create("Alice", a).unwrap();

    let err = reg.start("Alice", deck(), false, origin(&reg, 1)).unwrap_err();
    assert_eq!(err, RoomError::NoOpponent);
    assert!(!reg.room_of("Alice").unwrap().seat(0).unwrap().is_ready());
}

#[test]
fn test_start_outside_any_room() {
    let mut reg = registry();
    let (l, _r) = link(1);
    assert_eq!(
        reg.start("Alice", deck(), false, l).unwrap_err(),
        RoomError::NotInAnyRoom
    );
}

#[test]
fn test_first_start_waits_second_start_yields_plan() {
    let mut reg = registry();
    let _inboxes = paired(&mut reg);

    let err = reg.start("Alice", deck(), true, origin(&reg, 1)).unwrap_err();
    assert_eq!(err, RoomError::OpponentNotReady);
    assert_eq!(reg.room_of("Alice").unwrap().state(), RoomState::ReadyPending);

    let plan = reg.start("Bob", deck(), false, origin(&reg, 2)).unwrap();
    assert_eq!(plan.port, 40000);
    assert_eq!(plan.players[0].name, "Alice");
    assert_eq!(plan.players[1].name, "Bob");
    assert_eq!(plan.players[0].decklist, deck());
    // Only one of the two asked for no shuffle.
    assert!(!plan.noshuffle);
    assert_eq!(reg.room_of("Alice").unwrap().state(), RoomState::Starting);
}

#[test]
fn test_noshuffle_requires_both_players() {
    let mut reg = registry();
    let _inboxes = paired(&mut reg);
    let _ = reg.start("Alice", deck(), true, origin(&reg, 1));
    let plan = reg.start("Bob", deck(), true, origin(&reg, 2)).unwrap();
    assert!(plan.noshuffle);
}

#[test]
fn test_hand_off_sends_same_port_and_own_ids_then_closes() {
    let mut reg = registry();
    let (mut alice_rx, mut bob_rx) = paired(&mut reg);
    let _joined = alice_rx.try_recv().unwrap();

    let _ = reg.start("Alice", deck(), false, origin(&reg, 1));
    let plan = reg.start("Bob", deck(), false, origin(&reg, 2)).unwrap();
    reg.hand_off(plan.key(), FakeCore::default()).unwrap();

    assert!(reg.rooms().is_empty());
    assert_eq!(reg.running().len(), 1);
    assert_eq!(reg.running()[0].port(), plan.port);

    let mut ids = Vec::new();
    for (rx, expected) in [(&mut alice_rx, &plan.players[0]), (&mut bob_rx, &plan.players[1])] {
        match rx.try_recv().unwrap() {
            ServerPacket::Start(resp) => {
                assert_eq!(resp.result, StartResult::Success);
                assert_eq!(resp.port, Some(plan.port));
                assert_eq!(resp.id.as_ref(), Some(&expected.id));
                ids.push(resp.id);
            }
            other => panic!("expected Start, got {other:?}"),
        }
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }
    assert_ne!(ids[0], ids[1]);
}

#[test]
fn test_hand_off_of_missing_room_kills_core() {
    let mut reg = registry();
    let core = FakeCore::default();
    let killed = core.killed.clone();

    let key = MatchKey {
        port: 40000,
        serial: 1,
    };
    let err = reg.hand_off(key, core).unwrap_err();
    assert!(matches!(err, RoomError::InvariantViolation(_)));
    assert!(killed.load(Ordering::SeqCst));
}

#[test]
fn test_launch_failure_keeps_room_ready_for_retry() {
    let mut reg = registry();
    let (mut alice_rx, mut bob_rx) = paired(&mut reg);
    let _joined = alice_rx.try_recv().unwrap();

    let _ = reg.start("Alice", deck(), false, origin(&reg, 1));
    let plan = reg.start("Bob", deck(), false, origin(&reg, 2)).unwrap();
    reg.launch_failed(plan.port, "spawn failed");

    for rx in [&mut alice_rx, &mut bob_rx] {
        match rx.try_recv().unwrap() {
            ServerPacket::Start(resp) => {
                assert_eq!(resp.result, StartResult::Failure);
                assert!(resp.reason.unwrap().contains("spawn failed"));
            }
            other => panic!("expected Start, got {other:?}"),
        }
    }
    assert_eq!(reg.room_of("Alice").unwrap().state(), RoomState::Starting);

    // Resubmitting yields a fresh plan.
    let retry = reg.start("Alice", deck(), false, origin(&reg, 1)).unwrap();
    assert_eq!(retry.port, plan.port);
}

#[test]
fn test_start_from_fresh_connection_rebinds_seat() {
    let mut reg = registry();
    let (_alice_rx, mut bob_rx) = paired(&mut reg);

    let (fresh, _fresh_rx) = link(50);
    let err = reg.start("Bob", deck(), false, fresh).unwrap_err();
    assert_eq!(err, RoomError::OpponentNotReady);

    assert!(reg.is_attached(ConnectionId::new(50)));
    assert!(!reg.is_attached(ConnectionId::new(2)));
    assert!(matches!(
        bob_rx.try_recv(),
        Err(mpsc::error::TryRecvError::Disconnected)
    ));
}

// =========================================================================
// housekeeping
// =========================================================================

#[test]
fn test_housekeeping_removes_abandoned_rooms() {
    let mut reg = registry_with(RegistryConfig {
        room_min_port: 40000,
        room_max_port: 40009,
        abandon_after: Duration::from_secs(60),
    });
    let (a, mut alice_rx) = link(1);
    reg.create("Alice", a).unwrap();

    assert_eq!(reg.housekeeping(Instant::now()).rooms, 0);
    let later = Instant::now() + Duration::from_secs(61);
    assert_eq!(reg.housekeeping(later).rooms, 1);
    assert!(reg.rooms().is_empty());
    assert!(matches!(
        alice_rx.try_recv(),
        Err(mpsc::error::TryRecvError::Disconnected)
    ));
}

#[test]
fn test_housekeeping_reaps_matches_marked_finished() {
    let mut reg = registry();
    let _inboxes = paired(&mut reg);
    let _ = reg.start("Alice", deck(), false, origin(&reg, 1));
    let plan = reg.start("Bob", deck(), false, origin(&reg, 2)).unwrap();
    let core = FakeCore::default();
    let killed = core.killed.clone();
    reg.hand_off(plan.key(), core).unwrap();

    assert_eq!(reg.housekeeping(Instant::now()).matches, 0);
    assert!(reg.mark_finished(plan.key()));
    assert!(!reg.mark_finished(MatchKey {
        port: 1,
        serial: plan.serial,
    }));

    assert_eq!(reg.housekeeping(Instant::now()).matches, 1);
    assert!(reg.running().is_empty());
    assert!(!reg.name_in_use("Alice"));
    // The finished flag alone triggers a kill only if the core still runs.
    assert!(killed.load(Ordering::SeqCst));
}

#[test]
fn test_stale_exit_does_not_finish_match_on_reused_port() {
    let mut reg = registry_with(RegistryConfig {
        room_min_port: 40000,
        room_max_port: 40000,
        ..RegistryConfig::default()
    });
    let _first = paired(&mut reg);
    let _ = reg.start("Alice", deck(), false, origin(&reg, 1));
    let old = reg.start("Bob", deck(), false, origin(&reg, 2)).unwrap();
    let old_core = FakeCore::default();
    old_core.exited.store(true, Ordering::SeqCst);
    reg.hand_off(old.key(), old_core).unwrap();
    // Reaped through the poll before its exit notification arrived.
    assert_eq!(reg.housekeeping(Instant::now()).matches, 1);

    let _second = paired(&mut reg);
    let _ = reg.start("Alice", deck(), false, origin(&reg, 1));
    let new = reg.start("Bob", deck(), false, origin(&reg, 2)).unwrap();
    assert_eq!(new.port, old.port);
    assert_ne!(new.serial, old.serial);
    let new_core = FakeCore::default();
    let killed = new_core.killed.clone();
    reg.hand_off(new.key(), new_core).unwrap();

    assert!(!reg.mark_finished(old.key()));
    assert_eq!(reg.housekeeping(Instant::now()).matches, 0);
    assert!(!killed.load(Ordering::SeqCst));
    assert_eq!(reg.running()[0].key(), new.key());
}

#[test]
fn test_housekeeping_polls_core_exit() {
    let mut reg = registry();
    let _inboxes = paired(&mut reg);
    let _ = reg.start("Alice", deck(), false, origin(&reg, 1));
    let plan = reg.start("Bob", deck(), false, origin(&reg, 2)).unwrap();
    let core = FakeCore::default();
    let (exited, killed) = (core.exited.clone(), core.killed.clone());
    reg.hand_off(plan.key(), core).unwrap();

    exited.store(true, Ordering::SeqCst);
    assert_eq!(reg.housekeeping(Instant::now()).matches, 1);
    assert!(!killed.load(Ordering::SeqCst));
}

#[test]
fn test_housekeeping_kills_abandoned_cores() {
    let mut reg = registry_with(RegistryConfig {
        room_min_port: 40000,
        room_max_port: 40009,
        abandon_after: Duration::from_secs(60),
    });
    let _inboxes = paired(&mut reg);
    let _ = reg.start("Alice", deck(), false, origin(&reg, 1));
    let plan = reg.start("Bob", deck(), false, origin(&reg, 2)).unwrap();
    let core = FakeCore::default();
    let killed = core.killed.clone();
    reg.hand_off(plan.key(), core).unwrap();

    let later = Instant::now() + Duration::from_secs(120);
    assert_eq!(reg.housekeeping(later).matches, 1);
    assert!(killed.load(Ordering::SeqCst));
}

#[test]
fn test_close_waiting_leaves_running_matches() {
    let mut reg = registry();
    let _inboxes = paired(&mut reg);
    let _ = reg.start("Alice", deck(), false, origin(&reg, 1));
    let plan = reg.start("Bob", deck(), false, origin(&reg, 2)).unwrap();
    reg.hand_off(plan.key(), FakeCore::default()).unwrap();
    let (c, _rc) = link(3);
    reg.create("Carol", c).unwrap();

    assert_eq!(reg.close_waiting(), 1);
    assert!(reg.rooms().is_empty());
    assert_eq!(reg.running().len(), 1);
}
