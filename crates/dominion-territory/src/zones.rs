//! The zone overlay: administrator-defined areas whose flags override
//! claim-based permission logic.
//!
//! Zones are independent of ownership: a chunk may be claimed and zoned
//! at the same time. A chunk belongs to at most one zone; annexing a
//! chunk into a second zone moves it. The read path ([`zone_at`],
//! [`effective_flag`]) is what the protection resolver consumes; the
//! write path is administrative.
//!
//! [`zone_at`]: ZoneOverlayStore::zone_at
//! [`effective_flag`]: ZoneOverlayStore::effective_flag

use std::collections::BTreeMap;

use dashmap::DashMap;
use tracing::debug;

use dominion_types::{ChunkKey, ZoneFlag, ZoneId, ZoneKind, ZoneRecord};

/// Faults in zone administration.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ZoneError {
    /// No zone with the given id exists.
    #[error("unknown zone: {0}")]
    UnknownZone(ZoneId),
}

/// One zone as seen by readers: identity, kind, and explicit flags.
///
/// Chunk membership lives in the store's chunk index, not here, so a
/// cloned `Zone` handed to the resolver stays cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    /// Stable identifier.
    pub id: ZoneId,
    /// Administrator-facing name.
    pub name: String,
    /// Safe or war.
    pub kind: ZoneKind,
    /// Flags explicitly set on this zone. Unset flags fall back to the
    /// kind's documented defaults.
    pub flags: BTreeMap<ZoneFlag, bool>,
}

/// The concurrent chunk-to-zone overlay store.
#[derive(Debug, Default)]
pub struct ZoneOverlayStore {
    /// All zones by id.
    zones: DashMap<ZoneId, Zone>,
    /// Membership index: chunk -> the single zone containing it.
    by_chunk: DashMap<ChunkKey, ZoneId>,
}

impl ZoneOverlayStore {
    /// Create an empty overlay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a zone with no chunks and no explicit flags.
    pub fn create_zone(&self, name: impl Into<String>, kind: ZoneKind) -> ZoneId {
        let id = ZoneId::new();
        let name = name.into();
        debug!(%id, %name, ?kind, "Zone created");
        self.zones.insert(
            id,
            Zone {
                id,
                name,
                kind,
                flags: BTreeMap::new(),
            },
        );
        id
    }

    /// Remove a zone and release all its chunks. Returns whether the zone
    /// existed.
    pub fn remove_zone(&self, id: ZoneId) -> bool {
        let existed = self.zones.remove(&id).is_some();
        if existed {
            self.by_chunk.retain(|_, zone| *zone != id);
        }
        existed
    }

    /// Annex a chunk into the zone. If the chunk belonged to another zone
    /// it is moved; a chunk belongs to at most one zone.
    ///
    /// # Errors
    ///
    /// [`ZoneError::UnknownZone`] if no such zone exists.
    pub fn annex_chunk(&self, id: ZoneId, chunk: ChunkKey) -> Result<(), ZoneError> {
        if !self.zones.contains_key(&id) {
            return Err(ZoneError::UnknownZone(id));
        }
        self.by_chunk.insert(chunk, id);
        Ok(())
    }

    /// Release a chunk from whatever zone contains it. Returns whether the
    /// chunk was zoned.
    pub fn release_chunk(&self, chunk: &ChunkKey) -> bool {
        self.by_chunk.remove(chunk).is_some()
    }

    /// Set or clear an explicit flag on the zone. `None` clears the flag,
    /// restoring the kind's default.
    ///
    /// # Errors
    ///
    /// [`ZoneError::UnknownZone`] if no such zone exists.
    pub fn set_flag(
        &self,
        id: ZoneId,
        flag: ZoneFlag,
        value: Option<bool>,
    ) -> Result<(), ZoneError> {
        let Some(mut zone) = self.zones.get_mut(&id) else {
            return Err(ZoneError::UnknownZone(id));
        };
        match value {
            Some(v) => {
                zone.flags.insert(flag, v);
            }
            None => {
                zone.flags.remove(&flag);
            }
        }
        Ok(())
    }

    /// The zone containing the given chunk, if any.
    pub fn zone_at(&self, chunk: &ChunkKey) -> Option<Zone> {
        let id = *self.by_chunk.get(chunk)?;
        self.zones.get(&id).map(|zone| zone.clone())
    }

    /// The effective value of `flag` on `zone`: the explicit value if set,
    /// otherwise the documented default for the zone's kind.
    pub fn effective_flag(zone: &Zone, flag: ZoneFlag) -> bool {
        zone.flags
            .get(&flag)
            .copied()
            .unwrap_or_else(|| flag.default_for(zone.kind))
    }

    /// All chunks currently in the zone.
    pub fn chunks_of(&self, id: ZoneId) -> Vec<ChunkKey> {
        self.by_chunk
            .iter()
            .filter(|entry| *entry.value() == id)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Number of zones in the overlay.
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    /// Whether the overlay holds no zones.
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Export all zones (with membership) for persistence.
    pub fn export(&self) -> Vec<ZoneRecord> {
        self.zones
            .iter()
            .map(|zone| ZoneRecord {
                id: zone.id,
                name: zone.name.clone(),
                kind: zone.kind,
                chunks: self.chunks_of(zone.id),
                flags: zone.flags.clone(),
            })
            .collect()
    }

    /// Restore one persisted zone, replacing any existing zone with the
    /// same id.
    pub fn restore(&self, record: ZoneRecord) {
        self.zones.insert(
            record.id,
            Zone {
                id: record.id,
                name: record.name,
                kind: record.kind,
                flags: record.flags,
            },
        );
        for chunk in record.chunks {
            self.by_chunk.insert(chunk, record.id);
        }
    }
}
