//! Chunk addressing: the universal unit of ownership and zoning.
//!
//! A [`ChunkKey`] identifies one fixed-size grid cell of one world. All
//! ownership, zone membership, and anchor positions in the engine are
//! expressed in chunk keys; block-level positions are converted at the
//! boundary via [`ChunkKey::containing`].

use serde::{Deserialize, Serialize};

/// Side length of a chunk in blocks.
pub const CHUNK_SIZE: i32 = 16;

/// Identifier of a world, addressed by its stable name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorldId(pub String);

impl WorldId {
    /// Create a world identifier from a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Return the world name as a string slice.
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl core::fmt::Display for WorldId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WorldId {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

/// Address of one chunk: world plus chunk-grid coordinates.
///
/// Equality and hashing are by all three fields. Chunk coordinates are in
/// chunk units, not blocks.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkKey {
    /// World this chunk belongs to.
    pub world: WorldId,
    /// Chunk-grid x coordinate.
    pub x: i32,
    /// Chunk-grid z coordinate.
    pub z: i32,
}

impl ChunkKey {
    /// Create a chunk key from a world and chunk-grid coordinates.
    pub const fn new(world: WorldId, x: i32, z: i32) -> Self {
        Self { world, x, z }
    }

    /// Return the chunk containing the given block position.
    ///
    /// Uses floor division so negative block coordinates map correctly
    /// (block -1 lies in chunk -1, not chunk 0).
    pub const fn containing(world: WorldId, block_x: i32, block_z: i32) -> Self {
        Self {
            world,
            x: block_x.div_euclid(CHUNK_SIZE),
            z: block_z.div_euclid(CHUNK_SIZE),
        }
    }

    /// Return the four cardinal neighbors of this chunk, same world.
    ///
    /// Coordinates saturate at the i32 range edge rather than wrapping;
    /// a chunk at the world boundary simply repeats itself there, which
    /// is harmless for adjacency checks.
    pub fn neighbors(&self) -> [Self; 4] {
        [
            Self::new(self.world.clone(), self.x.saturating_add(1), self.z),
            Self::new(self.world.clone(), self.x.saturating_sub(1), self.z),
            Self::new(self.world.clone(), self.x, self.z.saturating_add(1)),
            Self::new(self.world.clone(), self.x, self.z.saturating_sub(1)),
        ]
    }

    /// Whether `other` is one of this chunk's four cardinal neighbors.
    pub fn is_adjacent_to(&self, other: &Self) -> bool {
        if self.world != other.world {
            return false;
        }
        let dx = self.x.abs_diff(other.x);
        let dz = self.z.abs_diff(other.z);
        (dx == 1 && dz == 0) || (dx == 0 && dz == 1)
    }
}

impl core::fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:({}, {})", self.world, self.x, self.z)
    }
}

/// A block-level position within a world.
///
/// Used for teleport destinations and movement snapshots; converted to a
/// [`ChunkKey`] whenever ownership or zoning is consulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockPos {
    /// World this position belongs to.
    pub world: WorldId,
    /// Block x coordinate.
    pub x: i32,
    /// Block y coordinate (vertical).
    pub y: i32,
    /// Block z coordinate.
    pub z: i32,
}

impl BlockPos {
    /// Create a block position.
    pub const fn new(world: WorldId, x: i32, y: i32, z: i32) -> Self {
        Self { world, x, y, z }
    }

    /// Return the chunk containing this position.
    pub fn chunk(&self) -> ChunkKey {
        ChunkKey::containing(self.world.clone(), self.x, self.z)
    }
}
