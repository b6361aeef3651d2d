use serde::{Deserialize, Serialize};
use strum_macros::Display;
use uuid::Uuid;

/// Identifies one loaded world on the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorldId(pub Uuid);

impl WorldId {
    pub fn new() -> Self {
        WorldId(Uuid::new_v4())
    }
}

impl Default for WorldId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The six block faces. Horizontal faces are the ones a stair can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum Facing {
    North,
    East,
    South,
    West,
    Up,
    Down,
}

impl Facing {
    pub fn opposite(self) -> Facing {
        match self {
            Facing::North => Facing::South,
            Facing::South => Facing::North,
            Facing::East => Facing::West,
            Facing::West => Facing::East,
            Facing::Up => Facing::Down,
            Facing::Down => Facing::Up,
        }
    }

    /// Unit offset of the neighbouring block on this face
    pub fn offset(self) -> (i32, i32, i32) {
        match self {
            Facing::North => (0, 0, -1),
            Facing::South => (0, 0, 1),
            Facing::East => (1, 0, 0),
            Facing::West => (-1, 0, 0),
            Facing::Up => (0, 1, 0),
            Facing::Down => (0, -1, 0),
        }
    }
}

/// Integer coordinates of a block in a world. This is the seat identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub world: WorldId,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(world: WorldId, x: i32, y: i32, z: i32) -> Self {
        Self { world, x, y, z }
    }

    /// The neighbouring block on `face`, or `None` past the edge of the coordinate range
    pub fn relative(&self, face: Facing) -> Option<BlockPos> {
        let (dx, dy, dz) = face.offset();
        Some(BlockPos::new(
            self.world,
            self.x.checked_add(dx)?,
            self.y.checked_add(dy)?,
            self.z.checked_add(dz)?,
        ))
    }

    pub fn up(&self) -> Option<BlockPos> {
        self.relative(Facing::Up)
    }

    /// The block's minimum corner as a continuous position
    pub fn corner(&self) -> Position {
        Position::new(self.world, self.x as f64, self.y as f64, self.z as f64)
    }
}

impl std::fmt::Display for BlockPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A continuous position in a world
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub world: WorldId,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(world: WorldId, x: f64, y: f64, z: f64) -> Self {
        Self { world, x, y, z }
    }

    pub fn offset(&self, dx: f64, dy: f64, dz: f64) -> Position {
        Position::new(self.world, self.x + dx, self.y + dy, self.z + dz)
    }

    /// Squared distance to `other`, or `None` when the two are in different worlds
    pub fn distance_squared(&self, other: &Position) -> Option<f64> {
        if self.world != other.world {
            return None;
        }
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        Some(dx * dx + dy * dy + dz * dz)
    }
}

/// Look direction in degrees. Yaw 0 faces south, 90 west, 180 north, 270 east.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Orientation {
    pub yaw: f32,
    pub pitch: f32,
}

impl Orientation {
    pub fn new(yaw: f32, pitch: f32) -> Self {
        Self { yaw, pitch }
    }

    /// Orientation looking straight out of the given face
    pub fn looking(face: Facing) -> Self {
        match face {
            Facing::South => Orientation::new(0.0, 0.0),
            Facing::West => Orientation::new(90.0, 0.0),
            Facing::North => Orientation::new(180.0, 0.0),
            Facing::East => Orientation::new(270.0, 0.0),
            Facing::Up => Orientation::new(0.0, -90.0),
            Facing::Down => Orientation::new(0.0, 90.0),
        }
    }

    /// The horizontal face closest to this yaw
    pub fn horizontal_facing(&self) -> Facing {
        let yaw = self.yaw.rem_euclid(360.0);
        match ((yaw + 45.0) / 90.0) as u32 % 4 {
            0 => Facing::South,
            1 => Facing::West,
            2 => Facing::North,
            _ => Facing::East,
        }
    }
}

/// Position plus orientation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Position,
    pub orientation: Orientation,
}

impl Pose {
    pub fn new(position: Position, orientation: Orientation) -> Self {
        Self {
            position,
            orientation,
        }
    }
}
