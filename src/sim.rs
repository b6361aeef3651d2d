//! In-memory host engine.
//!
//! Implements every collaborator trait against plain maps so the registry and
//! dispatcher can be driven without a real game server. Used by the test
//! suite and by the `chairs-sim` binary. Failure switches (`refuse_spawn`,
//! `refuse_attach`, `refuse_teleport`) let callers exercise rollback paths.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::engine::{
    ActorControl, ActorFlags, ActorHandle, BlockProbe, EngineError, Half, MovementControl,
    PlayerDirectory, PlayerId, TeleportMode,
};
use crate::geometry::{BlockPos, Facing, Orientation, Pose, WorldId};
use crate::seat::STAIRS_TAG;

/// State of one block. Positions with no entry are air.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockState {
    pub material: String,
    pub tags: Vec<String>,
    pub half: Option<Half>,
    pub facing: Option<Facing>,
    pub passable: bool,
}

impl BlockState {
    pub fn stairs(facing: Facing, half: Half) -> Self {
        Self {
            material: "oak_stairs".to_string(),
            tags: vec![STAIRS_TAG.to_string()],
            half: Some(half),
            facing: Some(facing),
            passable: false,
        }
    }

    pub fn solid(material: &str) -> Self {
        Self {
            material: material.to_string(),
            tags: Vec::new(),
            half: None,
            facing: None,
            passable: false,
        }
    }

    pub fn passable(material: &str) -> Self {
        Self {
            passable: true,
            ..Self::solid(material)
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimActor {
    pub pose: Pose,
    pub flags: ActorFlags,
    pub riders: Vec<PlayerId>,
}

#[derive(Debug, Clone)]
struct SimPlayer {
    pose: Pose,
    online: bool,
    vehicle: Option<ActorHandle>,
}

/// A teleport the engine carried out
#[derive(Debug, Clone, PartialEq)]
pub struct TeleportRecord {
    pub player: PlayerId,
    pub pose: Pose,
    pub mode: TeleportMode,
}

#[derive(Debug, Default)]
struct SimState {
    blocks: HashMap<BlockPos, BlockState>,
    actors: HashMap<ActorHandle, SimActor>,
    players: HashMap<PlayerId, SimPlayer>,
    teleports: Vec<TeleportRecord>,
    spawned: usize,
    destroyed: HashSet<ActorHandle>,
    refuse_spawn: bool,
    refuse_attach: bool,
    refuse_teleport: bool,
}

#[derive(Debug)]
pub struct SimWorld {
    world: WorldId,
    state: Mutex<SimState>,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWorld {
    pub fn new() -> Self {
        Self {
            world: WorldId::new(),
            state: Mutex::new(SimState::default()),
        }
    }

    /// The world every block and player of this sim lives in by default
    pub fn world(&self) -> WorldId {
        self.world
    }

    pub fn set_block(&self, pos: BlockPos, block: BlockState) {
        self.state.lock().blocks.insert(pos, block);
    }

    pub fn clear_block(&self, pos: BlockPos) -> Option<BlockState> {
        self.state.lock().blocks.remove(&pos)
    }

    pub fn block(&self, pos: &BlockPos) -> Option<BlockState> {
        self.state.lock().blocks.get(pos).cloned()
    }

    /// Move blocks one step towards `direction`, the way a piston pushes them
    pub fn shift_blocks(&self, positions: &[BlockPos], direction: Facing) {
        let mut state = self.state.lock();
        let moved: Vec<(BlockPos, BlockState)> = positions
            .iter()
            .filter_map(|pos| {
                // Blocks at the edge of the coordinate range stay put
                let target = pos.relative(direction)?;
                state.blocks.remove(pos).map(|block| (target, block))
            })
            .collect();
        state.blocks.extend(moved);
    }

    pub fn add_player(&self, pose: Pose) -> PlayerId {
        let player = PlayerId::new();
        self.state.lock().players.insert(
            player,
            SimPlayer {
                pose,
                online: true,
                vehicle: None,
            },
        );
        player
    }

    /// Take the player off the online list. Their pose stays known.
    pub fn forget_player(&self, player: PlayerId) {
        if let Some(p) = self.state.lock().players.get_mut(&player) {
            p.online = false;
        }
    }

    /// Change where the player is looking
    pub fn look(&self, player: PlayerId, orientation: Orientation) {
        if let Some(p) = self.state.lock().players.get_mut(&player) {
            p.pose.orientation = orientation;
        }
    }

    pub fn pose_of(&self, player: PlayerId) -> Option<Pose> {
        self.state.lock().players.get(&player).map(|p| p.pose)
    }

    pub fn vehicle_of(&self, player: PlayerId) -> Option<ActorHandle> {
        self.state.lock().players.get(&player).and_then(|p| p.vehicle)
    }

    /// Throw every rider off the actor, returning who was thrown
    pub fn eject_riders(&self, actor: ActorHandle) -> Vec<PlayerId> {
        let mut state = self.state.lock();
        let riders = match state.actors.get_mut(&actor) {
            Some(a) => std::mem::take(&mut a.riders),
            None => return Vec::new(),
        };
        for rider in &riders {
            if let Some(p) = state.players.get_mut(rider) {
                p.vehicle = None;
            }
        }
        riders
    }

    pub fn refuse_spawn(&self, refuse: bool) {
        self.state.lock().refuse_spawn = refuse;
    }

    pub fn refuse_attach(&self, refuse: bool) {
        self.state.lock().refuse_attach = refuse;
    }

    pub fn refuse_teleport(&self, refuse: bool) {
        self.state.lock().refuse_teleport = refuse;
    }

    pub fn actor_exists(&self, actor: ActorHandle) -> bool {
        self.state.lock().actors.contains_key(&actor)
    }

    pub fn actor_flags(&self, actor: ActorHandle) -> Option<ActorFlags> {
        self.state.lock().actors.get(&actor).map(|a| a.flags)
    }

    pub fn actor(&self, actor: ActorHandle) -> Option<SimActor> {
        self.state.lock().actors.get(&actor).cloned()
    }

    pub fn live_actor_count(&self) -> usize {
        self.state.lock().actors.len()
    }

    pub fn spawned_count(&self) -> usize {
        self.state.lock().spawned
    }

    pub fn destroyed_count(&self) -> usize {
        self.state.lock().destroyed.len()
    }

    pub fn teleports(&self) -> Vec<TeleportRecord> {
        self.state.lock().teleports.clone()
    }
}

impl BlockProbe for SimWorld {
    fn has_tag(&self, pos: &BlockPos, tag: &str) -> bool {
        self.state
            .lock()
            .blocks
            .get(pos)
            .is_some_and(|b| b.tags.iter().any(|t| t == tag))
    }

    fn half(&self, pos: &BlockPos) -> Option<Half> {
        self.state.lock().blocks.get(pos).and_then(|b| b.half)
    }

    fn facing(&self, pos: &BlockPos) -> Option<Facing> {
        self.state.lock().blocks.get(pos).and_then(|b| b.facing)
    }

    fn is_passable(&self, pos: &BlockPos) -> bool {
        self.state
            .lock()
            .blocks
            .get(pos)
            .map(|b| b.passable)
            .unwrap_or(true)
    }
}

impl ActorControl for SimWorld {
    fn spawn_actor(&self, pose: Pose, flags: ActorFlags) -> Result<ActorHandle, EngineError> {
        let mut state = self.state.lock();
        if state.refuse_spawn {
            return Err(EngineError::SpawnRefused(pose));
        }

        let handle = ActorHandle(Uuid::new_v4());
        state.actors.insert(
            handle,
            SimActor {
                pose,
                flags,
                riders: Vec::new(),
            },
        );
        state.spawned += 1;
        Ok(handle)
    }

    fn attach_rider(&self, actor: ActorHandle, player: PlayerId) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let refuse = state.refuse_attach;

        let seat_position = {
            let a = state
                .actors
                .get_mut(&actor)
                .ok_or(EngineError::UnknownActor(actor))?;
            if refuse || !a.riders.is_empty() {
                return Err(EngineError::NoRiderSlot(actor));
            }
            a.pose.position
        };

        let p = state
            .players
            .get_mut(&player)
            .ok_or(EngineError::UnknownPlayer(player))?;
        p.vehicle = Some(actor);
        p.pose.position = seat_position;

        if let Some(a) = state.actors.get_mut(&actor) {
            a.riders.push(player);
        }
        Ok(())
    }

    fn detach_rider(&self, actor: ActorHandle, player: PlayerId) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let a = state
            .actors
            .get_mut(&actor)
            .ok_or(EngineError::UnknownActor(actor))?;
        a.riders.retain(|r| *r != player);
        if let Some(p) = state.players.get_mut(&player) {
            if p.vehicle == Some(actor) {
                p.vehicle = None;
            }
        }
        Ok(())
    }

    fn destroy_actor(&self, actor: ActorHandle) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let removed = state
            .actors
            .remove(&actor)
            .ok_or(EngineError::UnknownActor(actor))?;
        for rider in removed.riders {
            if let Some(p) = state.players.get_mut(&rider) {
                p.vehicle = None;
            }
        }
        state.destroyed.insert(actor);
        Ok(())
    }

    fn riders(&self, actor: ActorHandle) -> Vec<PlayerId> {
        self.state
            .lock()
            .actors
            .get(&actor)
            .map(|a| a.riders.clone())
            .unwrap_or_default()
    }
}

impl MovementControl for SimWorld {
    fn teleport(&self, player: PlayerId, pose: Pose, mode: TeleportMode) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if state.refuse_teleport {
            return Err(EngineError::TeleportFailed {
                player,
                reason: "teleports disabled".to_string(),
            });
        }

        let p = state
            .players
            .get_mut(&player)
            .ok_or(EngineError::UnknownPlayer(player))?;
        p.pose = pose;
        state.teleports.push(TeleportRecord { player, pose, mode });
        Ok(())
    }

    fn current_pose(&self, player: PlayerId) -> Option<Pose> {
        self.pose_of(player)
    }
}

impl PlayerDirectory for SimWorld {
    fn online_players(&self) -> Vec<PlayerId> {
        let mut online: Vec<PlayerId> = self
            .state
            .lock()
            .players
            .iter()
            .filter(|(_, p)| p.online)
            .map(|(id, _)| *id)
            .collect();
        online.sort();
        online
    }
}
