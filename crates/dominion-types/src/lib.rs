//! Shared type definitions for the Dominion territory engine.
//!
//! This crate is the single source of truth for the types used across the
//! Dominion workspace: identifiers, chunk addressing, shared enums, the
//! closed result enums every operation returns, and the persistence
//! snapshot records.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for player, faction, and zone ids
//! - [`chunk`] -- [`ChunkKey`] addressing and block positions
//! - [`enums`] -- Relations, roles, zone kinds and flags, action kinds
//! - [`results`] -- Closed result enums, including the resolver [`Verdict`]
//! - [`faction`] -- The faction slice this engine consumes
//! - [`time`] -- Millisecond [`Timestamp`] for all expiry tracking
//! - [`snapshot`] -- Serializable records for the external persistence store

pub mod chunk;
pub mod enums;
pub mod faction;
pub mod ids;
pub mod results;
pub mod snapshot;
pub mod time;

// Re-export all public types at crate root for convenience.
pub use chunk::{BlockPos, CHUNK_SIZE, ChunkKey, WorldId};
pub use enums::{ActionKind, FactionRole, RelationType, ZoneFlag, ZoneKind};
pub use faction::{AllyPermissions, Faction};
pub use ids::{FactionId, PlayerId, ZoneId};
pub use results::{ClaimResult, HomeResult, RelationResult, TeleportResult, Verdict};
pub use snapshot::{ClaimRecord, RelationRecord, TerritorySnapshot, ZoneRecord};
pub use time::Timestamp;
