// Collaborator contracts the host game engine provides.
// The registry only talks to the world through these traits.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use uuid::Uuid;

use crate::geometry::{BlockPos, Facing, Pose};

/// A connected player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new() -> Self {
        PlayerId(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle to an engine-managed actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorHandle(pub Uuid);

impl std::fmt::Display for ActorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

bitflags! {
    /// Capabilities requested for a spawned actor
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ActorFlags: u32 {
        const NON_COLLIDING = 0x0000_0001;
        const INVISIBLE = 0x0000_0002;
        const INDESTRUCTIBLE = 0x0000_0004;
    }
}

impl ActorFlags {
    /// The flag set every seat proxy is spawned with
    pub fn seat_proxy() -> Self {
        ActorFlags::NON_COLLIDING | ActorFlags::INVISIBLE | ActorFlags::INDESTRUCTIBLE
    }
}

/// Vertical half of a two-part block such as a stair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum Half {
    Top,
    Bottom,
}

/// Whether a teleport must finish before the call returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TeleportMode {
    Sync,
    Async,
}

impl TeleportMode {
    pub fn for_quitting(quitting: bool) -> Self {
        if quitting {
            TeleportMode::Sync
        } else {
            TeleportMode::Async
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("engine refused to spawn an actor at {0:?}")]
    SpawnRefused(Pose),
    #[error("actor {0} has no free rider slot")]
    NoRiderSlot(ActorHandle),
    #[error("unknown actor {0}")]
    UnknownActor(ActorHandle),
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
    #[error("teleport of {player} failed: {reason}")]
    TeleportFailed { player: PlayerId, reason: String },
}

/// Read-only view of block state
pub trait BlockProbe {
    /// Whether the block's material carries the named tag
    fn has_tag(&self, pos: &BlockPos, tag: &str) -> bool;

    /// The block's half, if it is a two-part block
    fn half(&self, pos: &BlockPos) -> Option<Half>;

    /// The direction the block points, if it is directional
    fn facing(&self, pos: &BlockPos) -> Option<Facing>;

    /// Whether an entity can move through the block
    fn is_passable(&self, pos: &BlockPos) -> bool;
}

/// Spawning, mounting and removing actors
pub trait ActorControl {
    fn spawn_actor(&self, pose: Pose, flags: ActorFlags) -> Result<ActorHandle, EngineError>;

    fn attach_rider(&self, actor: ActorHandle, player: PlayerId) -> Result<(), EngineError>;

    fn detach_rider(&self, actor: ActorHandle, player: PlayerId) -> Result<(), EngineError>;

    fn destroy_actor(&self, actor: ActorHandle) -> Result<(), EngineError>;

    /// Current riders of the actor, empty when it no longer exists
    fn riders(&self, actor: ActorHandle) -> Vec<PlayerId>;
}

/// Player movement
pub trait MovementControl {
    fn teleport(&self, player: PlayerId, pose: Pose, mode: TeleportMode) -> Result<(), EngineError>;

    /// The player's live pose, `None` when the player is not online
    fn current_pose(&self, player: PlayerId) -> Option<Pose>;
}

/// Who is connected right now
pub trait PlayerDirectory {
    fn online_players(&self) -> Vec<PlayerId>;
}

/// Everything the registry needs from the host in one bound
pub trait Engine: ActorControl + MovementControl + PlayerDirectory {}

impl<T: ActorControl + MovementControl + PlayerDirectory> Engine for T {}
