//! Serializable records handed to the external persistence store.
//!
//! The engine exports its durable state (claims, zones, relations,
//! factions) as one [`TerritorySnapshot`] at shutdown and imports one at
//! startup. File format and timing are owned by the hosting environment;
//! these types only fix the shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::chunk::ChunkKey;
use crate::enums::{RelationType, ZoneFlag, ZoneKind};
use crate::faction::Faction;
use crate::ids::{FactionId, ZoneId};

/// One persisted claim: a chunk and its owning faction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    /// The claimed chunk.
    pub chunk: ChunkKey,
    /// The owning faction.
    pub owner: FactionId,
}

/// One persisted zone with its member chunks and explicit flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRecord {
    /// Stable zone identifier.
    pub id: ZoneId,
    /// Administrator-facing name.
    pub name: String,
    /// Safe or war.
    pub kind: ZoneKind,
    /// Chunks belonging to this zone.
    pub chunks: Vec<ChunkKey>,
    /// Flags explicitly set on this zone; unset flags fall back to the
    /// kind's documented defaults.
    pub flags: BTreeMap<ZoneFlag, bool>,
}

/// One persisted diplomatic edge between two factions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationRecord {
    /// One side of the pair.
    pub faction_a: FactionId,
    /// The other side of the pair.
    pub faction_b: FactionId,
    /// The relation in force.
    pub relation: RelationType,
    /// An unreciprocated ally request, if any.
    pub pending_request_by: Option<FactionId>,
}

/// The engine's complete durable state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerritorySnapshot {
    /// All factions known to the catalog.
    pub factions: Vec<Faction>,
    /// All claims.
    pub claims: Vec<ClaimRecord>,
    /// All zones.
    pub zones: Vec<ZoneRecord>,
    /// All non-neutral (or pending) relation edges.
    pub relations: Vec<RelationRecord>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::chunk::WorldId;
    use crate::ids::PlayerId;

    #[test]
    fn snapshot_roundtrip_json() {
        let faction = Faction::new(FactionId::new(), "Ironhold", PlayerId::new());
        let snapshot = TerritorySnapshot {
            claims: vec![ClaimRecord {
                chunk: ChunkKey::new(WorldId::new("overworld"), 5, 5),
                owner: faction.id,
            }],
            factions: vec![faction],
            zones: vec![],
            relations: vec![],
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: TerritorySnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, restored);
    }
}
