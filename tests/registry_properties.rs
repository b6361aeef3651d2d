//! Property and concurrency tests for the seat registry invariants


use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use chairs::{BlockPos, Facing, PlayerId, SeatRegistry};
use proptest::prelude::*;
use test_helpers::Fixture;

#[derive(Debug, Clone)]
enum Op {
    Sit { player: usize, seat: usize },
    Release { player: usize },
    Die { player: usize },
    BreakSeat { seat: usize },
}

fn op_strategy(players: usize, seats: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..players, 0..seats).prop_map(|(player, seat)| Op::Sit { player, seat }),
        2 => (0..players).prop_map(|player| Op::Release { player }),
        1 => (0..players).prop_map(|player| Op::Die { player }),
        1 => (0..seats).prop_map(|seat| Op::BreakSeat { seat }),
    ]
}

/// No seat and no player appears in two sessions, and the lookups agree
fn assert_exclusive(registry: &SeatRegistry, players: &[PlayerId], seats: &[BlockPos]) {
    let sessions = registry.sessions();
    let occupied: HashSet<BlockPos> = sessions.iter().map(|s| s.seat).collect();
    let seated: HashSet<PlayerId> = sessions.iter().map(|s| s.player).collect();
    assert_eq!(occupied.len(), sessions.len());
    assert_eq!(seated.len(), sessions.len());
    assert!(registry.indexes_consistent());

    for player in players {
        if let Some(seat) = registry.seat_of(player) {
            assert_eq!(registry.occupant_of(&seat), Some(*player));
        }
    }
    for seat in seats {
        if let Some(player) = registry.occupant_of(seat) {
            assert_eq!(registry.seat_of(&player), Some(*seat));
        }
    }
}

proptest! {
    #[test]
    fn prop_sessions_stay_mutually_exclusive(ops in prop::collection::vec(op_strategy(4, 3), 1..60)) {
        let fx = Fixture::new();
        // Three stairs in reach of everyone standing at the origin
        let seats: Vec<BlockPos> = (0..3).map(|x| fx.stair(x, 0, 0, Facing::North)).collect();
        let players: Vec<PlayerId> = (0..4).map(|_| fx.player_at(0.0, 0.0, 0.0)).collect();
        let origin = fx.pose(0.0, 0.0, 0.0);

        for op in ops {
            match op {
                Op::Sit { player, seat } => {
                    fx.registry.try_sit(
                        &*fx.sim,
                        &*fx.sim,
                        seats[seat],
                        players[player],
                        origin,
                    );
                }
                Op::Release { player } => {
                    fx.registry.release(&*fx.sim, players[player], false);
                }
                Op::Die { player } => {
                    fx.registry.discard(&*fx.sim, players[player]);
                }
                Op::BreakSeat { seat } => {
                    if let Some(player) = fx
                        .registry
                        .occupants_affected_by_position_change(&*fx.sim, &seats[seat])
                    {
                        fx.registry.release(&*fx.sim, player, false);
                    }
                }
            }

            assert_exclusive(&fx.registry, &players, &seats);
            // Every live proxy belongs to exactly one session
            prop_assert_eq!(fx.sim.live_actor_count(), fx.registry.len());
        }
    }
}

#[test]
fn test_concurrent_release_happens_once() {
    for _ in 0..20 {
        let fx = Fixture::new();
        let seat = fx.stair(0, 0, 0, Facing::North);
        let player = fx.player_at(0.0, 0.0, 0.0);
        assert!(fx.sit(player, seat).is_seated());

        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let registry = fx.registry.clone();
                let sim = fx.sim.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    registry.release(&*sim, player, false)
                })
            })
            .collect();

        let released = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|released| *released)
            .count();

        assert_eq!(released, 1);
        assert_eq!(fx.sim.teleports().len(), 1);
        assert_eq!(fx.sim.destroyed_count(), 1);
        assert!(fx.registry.is_empty());
    }
}

#[test]
fn test_concurrent_sits_on_one_seat_admit_one() {
    for _ in 0..20 {
        let fx = Fixture::new();
        let seat = fx.stair(0, 0, 0, Facing::North);
        let players: Vec<PlayerId> = (0..8).map(|_| fx.player_at(0.0, 0.0, 0.0)).collect();
        let pose = fx.pose(0.0, 0.0, 0.0);

        let barrier = Arc::new(Barrier::new(players.len()));
        let handles: Vec<_> = players
            .iter()
            .map(|player| {
                let registry = fx.registry.clone();
                let sim = fx.sim.clone();
                let barrier = barrier.clone();
                let player = *player;
                thread::spawn(move || {
                    barrier.wait();
                    registry
                        .try_sit(&*sim, &*sim, seat, player, pose)
                        .is_seated()
                })
            })
            .collect();

        let seated = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|seated| *seated)
            .count();

        assert_eq!(seated, 1);
        assert_eq!(fx.registry.len(), 1);
        assert!(fx.registry.indexes_consistent());
        // Losers rolled back their proxies
        assert_eq!(fx.sim.live_actor_count(), 1);
    }
}
