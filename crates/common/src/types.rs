use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A chunk column key: the (x, z) coordinates of one fixed-size column of
/// block data. Y is not part of the key; a chunk spans the full world height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// An integer block position in the world, used for the spawn point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Block data for one chunk column.
///
/// Opaque to storage backends: the block buffer's meaning (palette, layout,
/// section count) belongs to the world simulation. Backends only round-trip
/// the payload; ownership transfers to the caller on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    blocks: Vec<u32>,
}

impl Chunk {
    /// An empty column with no block data.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a chunk from a raw block buffer.
    pub fn from_blocks(blocks: Vec<u32>) -> Self {
        Self { blocks }
    }

    /// Read-only access to the raw block buffer.
    pub fn blocks(&self) -> &[u32] {
        &self.blocks
    }
}

/// Unique identifier for an entity in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// A saved entity: the snapshot of one movable object, associated with
/// exactly one chunk position at save time. Opaque to storage backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    /// Entity kind name, e.g. "pig" or "item".
    pub kind: String,
    pub position: Vec3,
}

impl EntityRecord {
    pub fn new(kind: impl Into<String>, position: Vec3) -> Self {
        Self {
            id: EntityId::new(),
            kind: kind.into(),
            position,
        }
    }
}

/// Player capability profile assigned to newly joining players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameMode {
    Survival,
    Creative,
    Adventure,
    Spectator,
}

impl GameMode {
    pub fn name(self) -> &'static str {
        match self {
            GameMode::Survival => "survival",
            GameMode::Creative => "creative",
            GameMode::Adventure => "adventure",
            GameMode::Spectator => "spectator",
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a string does not name a known game mode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown game mode: {0:?}")]
pub struct ParseGameModeError(pub String);

impl FromStr for GameMode {
    type Err = ParseGameModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "survival" => Ok(GameMode::Survival),
            "creative" => Ok(GameMode::Creative),
            "adventure" => Ok(GameMode::Adventure),
            "spectator" => Ok(GameMode::Spectator),
            other => Err(ParseGameModeError(other.to_string())),
        }
    }
}
