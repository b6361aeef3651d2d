// Seat registry: who sits where, on which proxy actor.
//
// All session state lives in one store behind one lock. The store keeps an
// arena of sessions plus three indexes (by player, by seat, by proxy) that
// always point at the same arena key; they are inserted and removed together.
// Engine calls are never made while the lock is held.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;
use strum_macros::Display;
use tracing::{debug, info, warn};

use crate::config::SeatConfig;
use crate::engine::{
    ActorControl, ActorFlags, ActorHandle, BlockProbe, Engine, MovementControl, PlayerId,
    TeleportMode,
};
use crate::events::{EventBus, SeatEvent};
use crate::geometry::{BlockPos, Facing, Orientation, Pose};
use crate::seat::{check_seat, SeatCheck};

/// One player sitting on one seat
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub player: PlayerId,
    pub seat: BlockPos,
    pub proxy: ActorHandle,
    /// Where the player stood before sitting down
    pub restore: Option<Pose>,
    /// Where the proxy was spawned
    pub mount: Pose,
    pub started_at: Instant,
}

/// Why a sit attempt did not happen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DeclineReason {
    NotASeat(SeatCheck),
    AlreadySeated,
    SeatOccupied,
    OutOfReach,
    SpawnFailed,
    AttachFailed,
    /// Another sit committed the same seat or player first
    LostRace,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SitOutcome {
    Seated(Session),
    Declined(DeclineReason),
}

impl SitOutcome {
    pub fn is_seated(&self) -> bool {
        matches!(self, SitOutcome::Seated(_))
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SitOutcome::Seated(session) => Some(session),
            SitOutcome::Declined(_) => None,
        }
    }

    pub fn declined(&self) -> Option<DeclineReason> {
        match self {
            SitOutcome::Seated(_) => None,
            SitOutcome::Declined(reason) => Some(*reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SessionKey(u64);

#[derive(Debug, Default)]
struct SessionStore {
    sessions: HashMap<SessionKey, Session>,
    next_key: u64,
    by_player: HashMap<PlayerId, SessionKey>,
    by_seat: HashMap<BlockPos, SessionKey>,
    by_proxy: HashMap<ActorHandle, SessionKey>,
}

impl SessionStore {
    /// Insert into all three indexes, or into none if any key is taken
    fn insert(&mut self, session: Session) -> Result<(), DeclineReason> {
        if self.by_player.contains_key(&session.player)
            || self.by_seat.contains_key(&session.seat)
            || self.by_proxy.contains_key(&session.proxy)
        {
            return Err(DeclineReason::LostRace);
        }

        let key = SessionKey(self.next_key);
        self.next_key += 1;

        self.by_player.insert(session.player, key);
        self.by_seat.insert(session.seat, key);
        self.by_proxy.insert(session.proxy, key);
        self.sessions.insert(key, session);
        Ok(())
    }

    fn remove(&mut self, key: SessionKey) -> Option<Session> {
        let session = self.sessions.remove(&key)?;
        self.by_player.remove(&session.player);
        self.by_seat.remove(&session.seat);
        self.by_proxy.remove(&session.proxy);
        Some(session)
    }

    fn remove_player(&mut self, player: &PlayerId) -> Option<Session> {
        let key = *self.by_player.get(player)?;
        self.remove(key)
    }

    fn remove_proxy(&mut self, proxy: &ActorHandle) -> Option<Session> {
        let key = *self.by_proxy.get(proxy)?;
        self.remove(key)
    }

    fn get_player(&self, player: &PlayerId) -> Option<&Session> {
        self.by_player.get(player).and_then(|key| self.sessions.get(key))
    }

    fn get_seat(&self, seat: &BlockPos) -> Option<&Session> {
        self.by_seat.get(seat).and_then(|key| self.sessions.get(key))
    }

    fn get_proxy(&self, proxy: &ActorHandle) -> Option<&Session> {
        self.by_proxy.get(proxy).and_then(|key| self.sessions.get(key))
    }
}

/// Tracks every active seat session
#[derive(Debug)]
pub struct SeatRegistry {
    config: SeatConfig,
    store: Mutex<SessionStore>,
    events: Option<EventBus>,
}

impl Default for SeatRegistry {
    fn default() -> Self {
        Self::new(SeatConfig::default())
    }
}

impl SeatRegistry {
    pub fn new(config: SeatConfig) -> Self {
        Self {
            config,
            store: Mutex::new(SessionStore::default()),
            events: None,
        }
    }

    /// Publish seat events on `bus`
    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn config(&self) -> &SeatConfig {
        &self.config
    }

    fn publish(&self, event: SeatEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }

    /// Try to sit `player` on the block at `seat`.
    ///
    /// Declines without side effects when the block is not a seat, the player
    /// is already sitting, the seat is taken, or the player is out of reach.
    /// If the engine fails to spawn the proxy or mount the player, anything
    /// already created is removed again and nothing is recorded.
    pub fn try_sit<E: ActorControl + ?Sized>(
        &self,
        engine: &E,
        probe: &dyn BlockProbe,
        seat: BlockPos,
        player: PlayerId,
        player_pose: Pose,
    ) -> SitOutcome {
        match self.sit(engine, probe, seat, player, player_pose) {
            Ok(session) => {
                info!(target: "seats", "{} sat on {} (proxy {})", player, seat, session.proxy);
                self.publish(SeatEvent::Seated {
                    player,
                    seat,
                    proxy: session.proxy,
                });
                SitOutcome::Seated(session)
            }
            Err(reason) => {
                debug!(target: "seats", "{} could not sit on {}: {}", player, seat, reason);
                self.publish(SeatEvent::Declined {
                    player,
                    seat,
                    reason,
                });
                SitOutcome::Declined(reason)
            }
        }
    }

    fn sit<E: ActorControl + ?Sized>(
        &self,
        engine: &E,
        probe: &dyn BlockProbe,
        seat: BlockPos,
        player: PlayerId,
        player_pose: Pose,
    ) -> Result<Session, DeclineReason> {
        let check = check_seat(probe, &seat, &self.config.tag);
        if !check.is_valid() {
            return Err(DeclineReason::NotASeat(check));
        }

        {
            let store = self.store.lock();
            if store.by_player.contains_key(&player) {
                return Err(DeclineReason::AlreadySeated);
            }
            if store.by_seat.contains_key(&seat) {
                return Err(DeclineReason::SeatOccupied);
            }
        }

        if !self.within_reach(&player_pose, &seat) {
            return Err(DeclineReason::OutOfReach);
        }

        let mount = self.mount_pose(&seat, probe.facing(&seat));

        let proxy = engine
            .spawn_actor(mount, ActorFlags::seat_proxy())
            .map_err(|e| {
                warn!(target: "seats", "Failed to spawn seat proxy at {}: {}", seat, e);
                DeclineReason::SpawnFailed
            })?;

        if let Err(e) = engine.attach_rider(proxy, player) {
            warn!(target: "seats", "Failed to mount {} on proxy {}: {}", player, proxy, e);
            destroy_proxy(engine, proxy);
            return Err(DeclineReason::AttachFailed);
        }

        let session = Session {
            player,
            seat,
            proxy,
            restore: Some(player_pose),
            mount,
            started_at: Instant::now(),
        };

        let committed = self.store.lock().insert(session.clone());
        if let Err(reason) = committed {
            if let Err(e) = engine.detach_rider(proxy, player) {
                debug!(target: "seats", "Detaching {} from discarded proxy {}: {}", player, proxy, e);
            }
            destroy_proxy(engine, proxy);
            return Err(reason);
        }

        Ok(session)
    }

    /// Whether the player stands close enough to the seat block
    pub fn within_reach(&self, player_pose: &Pose, seat: &BlockPos) -> bool {
        player_pose
            .position
            .distance_squared(&seat.corner())
            .is_some_and(|distance| distance <= self.config.reach_squared)
    }

    /// Pose for the proxy: centred on the block, slightly above the tread,
    /// looking away from the riser
    pub fn mount_pose(&self, seat: &BlockPos, facing: Option<Facing>) -> Pose {
        let [dx, dy, dz] = self.config.mount_offset;
        let orientation = facing
            .map(|face| Orientation::looking(face.opposite()))
            .unwrap_or_default();
        Pose::new(seat.corner().offset(dx, dy, dz), orientation)
    }

    /// Stand `player` up. Returns `false` if they were not sitting.
    ///
    /// The session is removed from every index before the engine is asked to
    /// do anything, so a second call (or one triggered by the teardown itself)
    /// finds nothing and does nothing.
    pub fn release<E: ActorControl + MovementControl + ?Sized>(
        &self,
        engine: &E,
        player: PlayerId,
        quitting: bool,
    ) -> bool {
        let session = self.store.lock().remove_player(&player);
        match session {
            Some(session) => {
                self.teardown(engine, session, quitting);
                true
            }
            None => false,
        }
    }

    /// Same as [`SeatRegistry::release`], resolving the session from its proxy
    /// actor. Returns the occupant that was stood up.
    pub fn release_proxy<E: ActorControl + MovementControl + ?Sized>(
        &self,
        engine: &E,
        proxy: ActorHandle,
        quitting: bool,
    ) -> Option<PlayerId> {
        let session = self.store.lock().remove_proxy(&proxy)?;
        let occupant = session.player;
        self.teardown(engine, session, quitting);
        Some(occupant)
    }

    /// End the player's session without moving them, for deaths where the
    /// respawn flow decides where the player goes next
    pub fn discard<E: ActorControl + ?Sized>(&self, engine: &E, player: PlayerId) -> bool {
        let session = self.store.lock().remove_player(&player);
        match session {
            Some(session) => {
                self.drop_session(engine, session);
                true
            }
            None => false,
        }
    }

    fn drop_session<E: ActorControl + ?Sized>(&self, engine: &E, session: Session) {
        destroy_proxy(engine, session.proxy);
        info!(target: "seats", "Dropped seat {} of {}", session.seat, session.player);
        self.publish(SeatEvent::Discarded {
            player: session.player,
            seat: session.seat,
        });
    }

    fn teardown<E: ActorControl + MovementControl + ?Sized>(
        &self,
        engine: &E,
        session: Session,
        quitting: bool,
    ) {
        destroy_proxy(engine, session.proxy);

        let live = engine.current_pose(session.player);
        match self.restore_target(session.restore, live) {
            Some(target) => {
                let mode = TeleportMode::for_quitting(quitting);
                if let Err(e) = engine.teleport(session.player, target, mode) {
                    warn!(target: "seats", "Failed to move {} off seat {}: {}", session.player, session.seat, e);
                }
            }
            None => {
                warn!(target: "seats", "No pose known for {}, leaving them in place", session.player);
            }
        }

        info!(target: "seats", "{} stood up from {}", session.player, session.seat);
        self.publish(SeatEvent::Released {
            player: session.player,
            seat: session.seat,
            quitting,
        });
    }

    /// Where a standing-up player goes.
    ///
    /// Position comes from the stored pre-sit pose, or failing that from the
    /// live position raised by the fallback clearance. Look direction always
    /// comes from the live pose so the camera does not snap.
    pub fn restore_target(&self, stored: Option<Pose>, live: Option<Pose>) -> Option<Pose> {
        let Some(live) = live else {
            return stored;
        };

        let position = stored
            .filter(|stored| stored.position.world == live.position.world)
            .map(|stored| stored.position)
            .unwrap_or_else(|| {
                live.position
                    .offset(0.0, self.config.fallback_clearance, 0.0)
            });

        Some(Pose::new(position, live.orientation))
    }

    /// Find who has to stand up because the block at `pos` changed.
    ///
    /// Returns the occupant if they are still riding the proxy; the caller
    /// releases them. A session whose proxy lost its rider is torn down here
    /// and `None` is returned.
    pub fn occupants_affected_by_position_change<E: ActorControl + ?Sized>(
        &self,
        engine: &E,
        pos: &BlockPos,
    ) -> Option<PlayerId> {
        let session = self.session_at(pos)?;

        if engine.riders(session.proxy).contains(&session.player) {
            return Some(session.player);
        }

        let stale = self.store.lock().remove_proxy(&session.proxy);
        if let Some(stale) = stale {
            debug!(target: "seats", "Proxy {} at {} lost its rider", stale.proxy, pos);
            self.drop_session(engine, stale);
        }
        None
    }

    /// Batch form for mechanisms that move many blocks at once
    pub fn occupants_affected_by_positions<E, I>(&self, engine: &E, positions: I) -> Vec<PlayerId>
    where
        E: ActorControl + ?Sized,
        I: IntoIterator<Item = BlockPos>,
    {
        let mut occupants = Vec::new();
        for pos in positions {
            if let Some(player) = self.occupants_affected_by_position_change(engine, &pos) {
                if !occupants.contains(&player) {
                    occupants.push(player);
                }
            }
        }
        occupants
    }

    /// Stand everyone up before the process exits. Returns how many sessions
    /// were drained.
    pub fn shutdown<E: Engine + ?Sized>(&self, engine: &E) -> usize {
        let mut drained = 0;

        for player in engine.online_players() {
            if self.release(engine, player, true) {
                drained += 1;
            }
        }

        // Sessions whose occupant is no longer listed as online
        for session in self.sessions() {
            if self.release_proxy(engine, session.proxy, true).is_some() {
                drained += 1;
            }
        }

        info!(target: "seats", "Drained {} seat sessions on shutdown", drained);
        drained
    }

    pub fn session_of(&self, player: &PlayerId) -> Option<Session> {
        self.store.lock().get_player(player).cloned()
    }

    pub fn session_at(&self, seat: &BlockPos) -> Option<Session> {
        self.store.lock().get_seat(seat).cloned()
    }

    pub fn session_for_proxy(&self, proxy: &ActorHandle) -> Option<Session> {
        self.store.lock().get_proxy(proxy).cloned()
    }

    pub fn occupant_of(&self, seat: &BlockPos) -> Option<PlayerId> {
        self.session_at(seat).map(|session| session.player)
    }

    pub fn seat_of(&self, player: &PlayerId) -> Option<BlockPos> {
        self.session_of(player).map(|session| session.seat)
    }

    pub fn is_occupied(&self, seat: &BlockPos) -> bool {
        self.store.lock().by_seat.contains_key(seat)
    }

    pub fn is_seated(&self, player: &PlayerId) -> bool {
        self.store.lock().by_player.contains_key(player)
    }

    pub fn is_proxy(&self, actor: &ActorHandle) -> bool {
        self.store.lock().by_proxy.contains_key(actor)
    }

    pub fn len(&self) -> usize {
        self.store.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all active sessions
    pub fn sessions(&self) -> Vec<Session> {
        self.store.lock().sessions.values().cloned().collect()
    }

    /// Check that the three indexes agree with the arena
    pub fn indexes_consistent(&self) -> bool {
        let store = self.store.lock();
        let count = store.sessions.len();
        if store.by_player.len() != count
            || store.by_seat.len() != count
            || store.by_proxy.len() != count
        {
            return false;
        }

        store.sessions.iter().all(|(key, session)| {
            store.by_player.get(&session.player) == Some(key)
                && store.by_seat.get(&session.seat) == Some(key)
                && store.by_proxy.get(&session.proxy) == Some(key)
        })
    }
}

fn destroy_proxy<E: ActorControl + ?Sized>(engine: &E, proxy: ActorHandle) {
    if let Err(e) = engine.destroy_actor(proxy) {
        debug!(target: "seats", "Proxy {} already gone: {}", proxy, e);
    }
}
