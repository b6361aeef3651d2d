//! End-to-end seat lifecycle tests
//!
//! These drive the dispatcher the way a host would and check what the
//! registry and the simulated engine end up with.


use chairs::engine::TeleportMode;
use chairs::events::{EventBus, SeatEvent};
use chairs::{DeclineReason, Facing, Handled, HostEvent, SeatRegistry};
use test_helpers::{right_click, Fixture};

// ============ Sitting ============

#[test]
fn test_reach_example_from_origin() {
    let fx = Fixture::new();
    let near = fx.stair(2, 0, 0, Facing::North);
    let far = fx.stair(3, 0, 0, Facing::North);
    let first = fx.player_at(0.0, 0.0, 0.0);
    let second = fx.player_at(0.0, 0.0, 0.0);

    assert!(matches!(fx.dispatcher.handle(right_click(first, near)), Handled::Seated(_)));
    assert_eq!(
        fx.dispatcher.handle(right_click(second, far)),
        Handled::Declined(DeclineReason::OutOfReach)
    );
}

#[test]
fn test_north_stair_seats_player_facing_south() {
    let fx = Fixture::new();
    let seat = fx.stair(0, 64, 0, Facing::North);
    let player = fx.player_at(0.0, 64.0, 1.0);

    let session = fx.sit(player, seat).session().cloned().unwrap();
    assert_eq!(session.mount.orientation.horizontal_facing(), Facing::South);

    let proxy = fx.sim.actor(session.proxy).unwrap();
    assert_eq!(proxy.pose, session.mount);
    assert_eq!(proxy.pose.position.x, 0.5);
    assert!((proxy.pose.position.y - 64.3).abs() < 1e-9);
    assert_eq!(proxy.pose.position.z, 0.5);
}

#[test]
fn test_rider_is_moved_onto_proxy_and_back() {
    let fx = Fixture::new();
    let seat = fx.stair(1, 64, 1, Facing::East);
    let player = fx.player_at(0.0, 64.0, 0.0);
    let before = fx.sim.pose_of(player).unwrap();

    let session = fx.sit(player, seat).session().cloned().unwrap();
    assert_eq!(fx.sim.vehicle_of(player), Some(session.proxy));
    assert_eq!(fx.sim.pose_of(player).unwrap().position, session.mount.position);

    fx.dispatcher.handle(HostEvent::RiderUnmounted {
        rider: player,
        vehicle: session.proxy,
    });
    assert_eq!(fx.sim.pose_of(player).unwrap().position, before.position);
    assert_eq!(fx.sim.vehicle_of(player), None);
}

#[test]
fn test_seat_changes_hands_after_release() {
    let fx = Fixture::new();
    let seat = fx.stair(0, 0, 0, Facing::South);
    let first = fx.player_at(0.0, 0.0, 1.0);
    let second = fx.player_at(1.0, 0.0, 0.0);

    assert!(fx.sit(first, seat).is_seated());
    assert_eq!(fx.sit(second, seat).declined(), Some(DeclineReason::SeatOccupied));

    assert!(fx.registry.release(&*fx.sim, first, false));
    assert!(fx.sit(second, seat).is_seated());
    assert_eq!(fx.registry.occupant_of(&seat), Some(second));
}

// ============ Block changes ============

#[test]
fn test_breaking_seat_frees_seat_and_occupant() {
    let fx = Fixture::new();
    let seat = fx.stair(0, 0, 0, Facing::North);
    let player = fx.player_at(0.0, 0.0, 0.0);
    fx.sit(player, seat);

    assert_eq!(
        fx.registry
            .occupants_affected_by_position_change(&*fx.sim, &seat),
        Some(player)
    );

    fx.sim.clear_block(seat);
    assert_eq!(
        fx.dispatcher.handle(HostEvent::BlockRemoved { pos: seat }),
        Handled::Released(vec![player])
    );
    assert!(fx.registry.session_at(&seat).is_none());
    assert!(fx.registry.session_of(&player).is_none());
    assert_eq!(fx.sim.live_actor_count(), 0);
}

#[test]
fn test_breaking_unrelated_block_is_ignored() {
    let fx = Fixture::new();
    let seat = fx.stair(0, 0, 0, Facing::North);
    let player = fx.player_at(0.0, 0.0, 0.0);
    fx.sit(player, seat);

    let neighbour = seat.relative(Facing::West).unwrap();
    assert_eq!(
        fx.dispatcher.handle(HostEvent::BlockRemoved { pos: neighbour }),
        Handled::Ignored
    );
    assert!(fx.registry.is_seated(&player));
}

#[test]
fn test_piston_moving_two_seats_releases_both() {
    let fx = Fixture::new();
    let a = fx.stair(0, 0, 0, Facing::North);
    let b = fx.stair(1, 0, 0, Facing::North);
    let first = fx.player_at(0.0, 0.0, 0.0);
    let second = fx.player_at(1.0, 0.0, 0.0);
    fx.sit(first, a);
    fx.sit(second, b);

    fx.sim.shift_blocks(&[b, a], Facing::East);
    let handled = fx.dispatcher.handle(HostEvent::BlocksMoved {
        positions: vec![a, b],
    });
    assert_eq!(handled, Handled::Released(vec![first, second]));
    assert!(fx.registry.is_empty());
}

// ============ Leaving ============

#[test]
fn test_disconnect_twice_releases_once() {
    let fx = Fixture::new();
    let seat = fx.stair(0, 0, 0, Facing::North);
    let player = fx.player_at(0.0, 0.0, 0.0);
    fx.sit(player, seat);

    assert_eq!(
        fx.dispatcher.handle(HostEvent::ConnectionClosed { player }),
        Handled::Released(vec![player])
    );
    assert_eq!(
        fx.dispatcher.handle(HostEvent::ConnectionClosed { player }),
        Handled::Ignored
    );

    let teleports = fx.sim.teleports();
    assert_eq!(teleports.len(), 1);
    assert_eq!(teleports[0].mode, TeleportMode::Sync);
}

#[test]
fn test_death_then_respawn_can_sit_again() {
    let fx = Fixture::new();
    let seat = fx.stair(0, 0, 0, Facing::North);
    let player = fx.player_at(0.0, 0.0, 0.0);
    fx.sit(player, seat);

    assert_eq!(
        fx.dispatcher.handle(HostEvent::PlayerDied { player }),
        Handled::Discarded(player)
    );
    assert!(fx.sim.teleports().is_empty());
    assert!(fx.sit(player, seat).is_seated());
}

#[test]
fn test_shutdown_drains_all_sessions() {
    let fx = Fixture::new();
    let count = 5;
    for i in 0..count {
        let seat = fx.stair(i * 4, 0, 0, Facing::North);
        let player = fx.player_at((i * 4) as f64, 0.0, 0.0);
        assert!(fx.sit(player, seat).is_seated());
    }
    // A bystander who never sat
    fx.player_at(100.0, 0.0, 0.0);

    assert_eq!(
        fx.dispatcher.handle(HostEvent::Shutdown),
        Handled::Drained(count as usize)
    );
    assert!(fx.registry.is_empty());
    assert_eq!(fx.sim.live_actor_count(), 0);

    let teleports = fx.sim.teleports();
    assert_eq!(teleports.len(), count as usize);
    assert!(teleports.iter().all(|t| t.mode == TeleportMode::Sync));
}

// ============ Events ============

#[tokio::test]
async fn test_lifecycle_events_in_order() {
    let (bus, mut receiver) = EventBus::new(16);
    let fx = Fixture::with_registry(SeatRegistry::default().with_events(bus));
    let seat = fx.stair(0, 0, 0, Facing::North);
    let player = fx.player_at(0.0, 0.0, 0.0);

    fx.dispatcher.handle(right_click(player, seat));
    fx.dispatcher.handle(HostEvent::PlayerDied { player });

    let first = receiver.recv().await.unwrap().event;
    let second = receiver.recv().await.unwrap().event;
    assert!(matches!(first, SeatEvent::Seated { player: p, .. } if p == player));
    assert_eq!(second, SeatEvent::Discarded { player, seat });
}
