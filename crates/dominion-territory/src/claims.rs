//! The chunk ownership registry: claim, unclaim, and overclaim.
//!
//! The owner map is the single authoritative record of territory. Every
//! mutation runs as a per-chunk check-and-set under the map's shard guard:
//! the expected prior state (absent, or owned by a specific faction) is
//! part of the precondition, so two racing mutations on the same chunk
//! yield exactly one winner and the loser gets a well-defined result.
//!
//! The per-faction chunk index is derived state, updated after the owner
//! map commits; readers needing authority consult the owner map.
//!
//! # Claim preconditions (in check order)
//!
//! 1. Actor is an officer of the acting faction.
//! 2. The chunk is not inside a zone (safe and war zones exclude claims).
//! 3. The faction's power supports one more claim
//!    (`claims + 1 <= power / power_per_claim`).
//! 4. Unless this is the faction's first claim, the chunk is adjacent to
//!    an existing claim of the same faction.
//! 5. The chunk is unowned (checked atomically at commit).
//!
//! Overclaim replaces adjacency with hostility: the current owner must be
//! an enemy, the attacker must clear the configured power margin, and the
//! defender must be holding more claims than its power supports.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::{debug, info};

use dominion_relations::{FactionCatalog, RelationGraph};
use dominion_types::{ChunkKey, ClaimRecord, ClaimResult, FactionId, PlayerId, RelationType};

use crate::zones::ZoneOverlayStore;
use dominion_types::ZoneKind;

/// Source of faction power values, owned by the external currency/ledger
/// subsystem. Consumed by the claim ceiling and the overclaim comparison.
pub trait PowerLedger: Send + Sync {
    /// The current power of the faction. Unknown factions report zero.
    fn faction_power(&self, faction: FactionId) -> Decimal;
}

/// Configured parameters of the claim rules.
#[derive(Debug, Clone, Copy)]
pub struct ClaimRules {
    /// Power required to hold one claim.
    pub power_per_claim: Decimal,
    /// Margin by which an attacker's power must exceed the defender's for
    /// an overclaim to succeed.
    pub overclaim_power_margin: Decimal,
    /// Whether claims beyond a faction's first must border an existing
    /// claim of the same faction.
    pub require_adjacency: bool,
}

impl Default for ClaimRules {
    fn default() -> Self {
        Self {
            power_per_claim: Decimal::TWO,
            overclaim_power_margin: Decimal::ONE,
            require_adjacency: true,
        }
    }
}

/// The concurrent chunk-to-owner registry.
pub struct ChunkOwnershipRegistry {
    /// Authoritative owner per chunk.
    owners: DashMap<ChunkKey, FactionId>,
    /// Derived index: faction -> its claimed chunks.
    by_faction: DashMap<FactionId, BTreeSet<ChunkKey>>,
    rules: ClaimRules,
    catalog: Arc<FactionCatalog>,
    relations: Arc<RelationGraph>,
    zones: Arc<ZoneOverlayStore>,
    power: Arc<dyn PowerLedger>,
}

impl core::fmt::Debug for ChunkOwnershipRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ChunkOwnershipRegistry")
            .field("claims", &self.owners.len())
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

impl ChunkOwnershipRegistry {
    /// Create an empty registry wired to its collaborators.
    pub fn new(
        rules: ClaimRules,
        catalog: Arc<FactionCatalog>,
        relations: Arc<RelationGraph>,
        zones: Arc<ZoneOverlayStore>,
        power: Arc<dyn PowerLedger>,
    ) -> Self {
        Self {
            owners: DashMap::new(),
            by_faction: DashMap::new(),
            rules,
            catalog,
            relations,
            zones,
            power,
        }
    }

    /// The faction owning the chunk, if any.
    pub fn owner_of(&self, chunk: &ChunkKey) -> Option<FactionId> {
        self.owners.get(chunk).map(|owner| *owner)
    }

    /// Number of chunks the faction currently holds.
    pub fn claim_count(&self, faction: FactionId) -> u64 {
        self.by_faction
            .get(&faction)
            .map(|chunks| u64::try_from(chunks.len()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }

    /// All chunks the faction currently holds.
    pub fn claims_of(&self, faction: FactionId) -> Vec<ChunkKey> {
        self.by_faction
            .get(&faction)
            .map(|chunks| chunks.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Claim an unowned chunk for the faction.
    pub fn claim(&self, chunk: ChunkKey, faction: FactionId, actor: PlayerId) -> ClaimResult {
        if let Some(denied) = self.check_actor(faction, actor) {
            return denied;
        }
        if let Some(denied) = Self::check_zone_exclusion(&self.zones, &chunk) {
            return denied;
        }

        let held = self.claim_count(faction);
        if held.saturating_add(1) > self.max_claims(faction) {
            return ClaimResult::PowerTooLow;
        }
        if self.rules.require_adjacency && held > 0 && !self.borders_own_claim(&chunk, faction) {
            return ClaimResult::NotAdjacent;
        }

        // Atomic commit: the chunk must still be unowned.
        match self.owners.entry(chunk.clone()) {
            Entry::Occupied(_) => return ClaimResult::AlreadyOwned,
            Entry::Vacant(vacant) => {
                vacant.insert(faction);
            }
        }
        self.index_add(faction, chunk.clone());
        info!(%chunk, %faction, "Chunk claimed");
        ClaimResult::Success
    }

    /// Return a chunk owned by the actor's faction to wilderness.
    pub fn unclaim(&self, chunk: &ChunkKey, actor: PlayerId) -> ClaimResult {
        let Some(faction) = self.catalog.faction_of(actor) else {
            return ClaimResult::NotInFaction;
        };
        let is_officer = self
            .catalog
            .role_in(faction, actor)
            .is_some_and(dominion_types::FactionRole::is_officer);
        if !is_officer {
            return ClaimResult::NotOfficer;
        }

        // Atomic commit: only the current owner can release.
        let removed = self
            .owners
            .remove_if(chunk, |_, owner| *owner == faction)
            .is_some();
        if !removed {
            return ClaimResult::NotOwned;
        }
        self.index_remove(faction, chunk);
        info!(%chunk, %faction, "Chunk unclaimed");
        ClaimResult::Success
    }

    /// Forcibly take an enemy-owned chunk based on relative power.
    ///
    /// Ownership transfers in a single replacement of the owner entry;
    /// no intermediate unowned state is observable.
    pub fn overclaim(&self, chunk: ChunkKey, attacking: FactionId, actor: PlayerId) -> ClaimResult {
        if let Some(denied) = self.check_actor(attacking, actor) {
            return denied;
        }
        if let Some(denied) = Self::check_zone_exclusion(&self.zones, &chunk) {
            return denied;
        }

        let Some(defender) = self.owner_of(&chunk) else {
            return ClaimResult::NotOwned;
        };
        if defender == attacking {
            return ClaimResult::AlreadyOwned;
        }
        if self.relations.relation_between(attacking, defender) != RelationType::Enemy {
            return ClaimResult::NotEnemy;
        }
        if !self.power_margin_met(attacking, defender) {
            return ClaimResult::PowerTooLow;
        }

        // Atomic commit: the owner must still be the defender we checked.
        match self.owners.entry(chunk.clone()) {
            Entry::Occupied(mut occupied) if *occupied.get() == defender => {
                occupied.insert(attacking);
            }
            // Owner vanished or changed under us: the race loser result.
            _ => return ClaimResult::AlreadyOwned,
        }
        self.index_remove(defender, &chunk);
        self.index_add(attacking, chunk.clone());
        info!(%chunk, %attacking, %defender, "Chunk overclaimed");
        ClaimResult::Success
    }

    /// Return every claim of the faction to wilderness. Used on faction
    /// deletion. Returns the number of chunks released.
    pub fn release_all(&self, faction: FactionId) -> usize {
        let chunks = self
            .by_faction
            .remove(&faction)
            .map(|(_, set)| set)
            .unwrap_or_default();
        let mut released = 0_usize;
        for chunk in chunks {
            if self
                .owners
                .remove_if(&chunk, |_, owner| *owner == faction)
                .is_some()
            {
                released = released.saturating_add(1);
            }
        }
        if released > 0 {
            info!(%faction, released, "All claims released");
        }
        released
    }

    /// Export all claims for persistence.
    pub fn export(&self) -> Vec<ClaimRecord> {
        self.owners
            .iter()
            .map(|entry| ClaimRecord {
                chunk: entry.key().clone(),
                owner: *entry.value(),
            })
            .collect()
    }

    /// Restore one persisted claim, bypassing the gameplay preconditions.
    /// Validity filtering (unknown factions) is the importer's job.
    pub fn restore(&self, record: ClaimRecord) {
        if let Some(previous) = self.owners.insert(record.chunk.clone(), record.owner) {
            self.index_remove(previous, &record.chunk);
        }
        self.index_add(record.owner, record.chunk);
    }

    /// Membership and role gate shared by all mutations.
    fn check_actor(&self, faction: FactionId, actor: PlayerId) -> Option<ClaimResult> {
        match self.catalog.role_in(faction, actor) {
            None => Some(ClaimResult::NotInFaction),
            Some(role) if !role.is_officer() => Some(ClaimResult::NotOfficer),
            Some(_) => None,
        }
    }

    /// Zones exclude claims entirely.
    fn check_zone_exclusion(zones: &ZoneOverlayStore, chunk: &ChunkKey) -> Option<ClaimResult> {
        match zones.zone_at(chunk).map(|zone| zone.kind) {
            Some(ZoneKind::Safe) => Some(ClaimResult::Safezone),
            Some(ZoneKind::War) => Some(ClaimResult::Warzone),
            None => None,
        }
    }

    /// Whether any cardinal neighbor of `chunk` is owned by `faction`.
    fn borders_own_claim(&self, chunk: &ChunkKey, faction: FactionId) -> bool {
        chunk
            .neighbors()
            .iter()
            .any(|neighbor| self.owner_of(neighbor) == Some(faction))
    }

    /// Maximum number of claims the faction's power supports.
    fn max_claims(&self, faction: FactionId) -> u64 {
        let power = self.power.faction_power(faction);
        power
            .checked_div(self.rules.power_per_claim)
            .map(|ratio| ratio.floor())
            .and_then(|ratio| ratio.to_u64())
            .unwrap_or(0)
    }

    /// The overclaim power rule: the attacker clears the margin and the
    /// defender holds more claims than its power supports.
    fn power_margin_met(&self, attacking: FactionId, defender: FactionId) -> bool {
        let attacker_power = self.power.faction_power(attacking);
        let defender_power = self.power.faction_power(defender);
        let threshold = defender_power
            .checked_add(self.rules.overclaim_power_margin)
            .unwrap_or(Decimal::MAX);
        if attacker_power <= threshold {
            return false;
        }
        let defender_claims = Decimal::from(self.claim_count(defender));
        let supported = defender_claims
            .checked_mul(self.rules.power_per_claim)
            .unwrap_or(Decimal::MAX);
        defender_power < supported
    }

    fn index_add(&self, faction: FactionId, chunk: ChunkKey) {
        self.by_faction.entry(faction).or_default().insert(chunk);
    }

    fn index_remove(&self, faction: FactionId, chunk: &ChunkKey) {
        if let Some(mut chunks) = self.by_faction.get_mut(&faction) {
            chunks.remove(chunk);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use dashmap::DashMap;
    use dominion_types::{FactionRole, WorldId};
    use rust_decimal_macros::dec;

    /// Test ledger with explicit per-faction power.
    #[derive(Debug, Default)]
    struct StubLedger {
        power: DashMap<FactionId, Decimal>,
    }

    impl StubLedger {
        fn set(&self, faction: FactionId, power: Decimal) {
            self.power.insert(faction, power);
        }
    }

    impl PowerLedger for StubLedger {
        fn faction_power(&self, faction: FactionId) -> Decimal {
            self.power.get(&faction).map(|p| *p).unwrap_or_default()
        }
    }

    struct Fixture {
        registry: ChunkOwnershipRegistry,
        catalog: Arc<FactionCatalog>,
        relations: Arc<RelationGraph>,
        zones: Arc<ZoneOverlayStore>,
        ledger: Arc<StubLedger>,
    }

    fn fixture() -> Fixture {
        let catalog = Arc::new(FactionCatalog::new());
        let relations = Arc::new(RelationGraph::default());
        let zones = Arc::new(ZoneOverlayStore::new());
        let ledger = Arc::new(StubLedger::default());
        let registry = ChunkOwnershipRegistry::new(
            ClaimRules::default(),
            Arc::clone(&catalog),
            Arc::clone(&relations),
            Arc::clone(&zones),
            Arc::clone(&ledger) as Arc<dyn PowerLedger>,
        );
        Fixture {
            registry,
            catalog,
            relations,
            zones,
            ledger,
        }
    }

    fn chunk(x: i32, z: i32) -> ChunkKey {
        ChunkKey::new(WorldId::new("overworld"), x, z)
    }

    /// Create a faction with an officer actor and the given power.
    fn faction_with_power(fx: &Fixture, name: &str, power: Decimal) -> (FactionId, PlayerId) {
        let owner = PlayerId::new();
        let id = fx.catalog.create(name, owner).unwrap();
        fx.ledger.set(id, power);
        (id, owner)
    }

    #[test]
    fn first_claim_needs_no_adjacency() {
        let fx = fixture();
        let (f1, actor) = faction_with_power(&fx, "F1", dec!(10));
        assert_eq!(fx.registry.claim(chunk(5, 5), f1, actor), ClaimResult::Success);
        assert_eq!(fx.registry.owner_of(&chunk(5, 5)), Some(f1));
        assert_eq!(fx.registry.claim_count(f1), 1);
    }

    #[test]
    fn second_claim_must_border_the_first() {
        let fx = fixture();
        let (f1, actor) = faction_with_power(&fx, "F1", dec!(10));
        fx.registry.claim(chunk(5, 5), f1, actor);

        assert_eq!(
            fx.registry.claim(chunk(8, 8), f1, actor),
            ClaimResult::NotAdjacent
        );
        assert_eq!(fx.registry.claim(chunk(5, 6), f1, actor), ClaimResult::Success);
    }

    #[test]
    fn claimed_chunk_rejects_a_second_owner() {
        let fx = fixture();
        let (f1, a1) = faction_with_power(&fx, "F1", dec!(10));
        let (f2, a2) = faction_with_power(&fx, "F2", dec!(10));

        assert_eq!(fx.registry.claim(chunk(5, 5), f1, a1), ClaimResult::Success);
        assert_eq!(fx.registry.claim(chunk(5, 5), f2, a2), ClaimResult::AlreadyOwned);
        assert_eq!(fx.registry.owner_of(&chunk(5, 5)), Some(f1));
    }

    #[test]
    fn zones_exclude_claiming() {
        let fx = fixture();
        let (f1, actor) = faction_with_power(&fx, "F1", dec!(10));

        let spawn = fx.zones.create_zone("spawn", ZoneKind::Safe);
        fx.zones.annex_chunk(spawn, chunk(0, 0)).unwrap();
        assert_eq!(fx.registry.claim(chunk(0, 0), f1, actor), ClaimResult::Safezone);

        let arena = fx.zones.create_zone("arena", ZoneKind::War);
        fx.zones.annex_chunk(arena, chunk(1, 0)).unwrap();
        assert_eq!(fx.registry.claim(chunk(1, 0), f1, actor), ClaimResult::Warzone);
    }

    #[test]
    fn power_ceiling_limits_claims() {
        let fx = fixture();
        // power 4 / power_per_claim 2 => at most 2 claims.
        let (f1, actor) = faction_with_power(&fx, "F1", dec!(4));
        assert_eq!(fx.registry.claim(chunk(0, 0), f1, actor), ClaimResult::Success);
        assert_eq!(fx.registry.claim(chunk(0, 1), f1, actor), ClaimResult::Success);
        assert_eq!(fx.registry.claim(chunk(0, 2), f1, actor), ClaimResult::PowerTooLow);
    }

    #[test]
    fn outsider_and_member_role_gates() {
        let fx = fixture();
        let (f1, _) = faction_with_power(&fx, "F1", dec!(10));

        let stranger = PlayerId::new();
        assert_eq!(
            fx.registry.claim(chunk(2, 2), f1, stranger),
            ClaimResult::NotInFaction
        );

        let grunt = PlayerId::new();
        fx.catalog.add_member(f1, grunt, FactionRole::Member).unwrap();
        assert_eq!(fx.registry.claim(chunk(2, 2), f1, grunt), ClaimResult::NotOfficer);
    }

    #[test]
    fn unclaim_requires_ownership() {
        let fx = fixture();
        let (f1, a1) = faction_with_power(&fx, "F1", dec!(10));
        let (_, a2) = faction_with_power(&fx, "F2", dec!(10));

        fx.registry.claim(chunk(5, 5), f1, a1);
        assert_eq!(fx.registry.unclaim(&chunk(5, 5), a2), ClaimResult::NotOwned);
        assert_eq!(fx.registry.unclaim(&chunk(5, 5), a1), ClaimResult::Success);
        assert_eq!(fx.registry.owner_of(&chunk(5, 5)), None);
        assert_eq!(fx.registry.unclaim(&chunk(5, 5), a1), ClaimResult::NotOwned);
    }

    #[test]
    fn overclaim_requires_enemy_relation() {
        let fx = fixture();
        let (f1, a1) = faction_with_power(&fx, "F1", dec!(2));
        let (f2, a2) = faction_with_power(&fx, "F2", dec!(20));

        fx.registry.claim(chunk(5, 5), f1, a1);
        assert_eq!(
            fx.registry.overclaim(chunk(5, 5), f2, a2),
            ClaimResult::NotEnemy
        );
    }

    #[test]
    fn overclaim_transfers_ownership_atomically() {
        let fx = fixture();
        // Defender: power 2 but 2 claims needing 4 power => raidable.
        let (f1, a1) = faction_with_power(&fx, "F1", dec!(4));
        let (f2, a2) = faction_with_power(&fx, "F2", dec!(20));

        fx.registry.claim(chunk(5, 5), f1, a1);
        fx.registry.claim(chunk(5, 6), f1, a1);
        fx.ledger.set(f1, dec!(2));
        fx.relations.set_enemy(f2, f1);

        assert_eq!(fx.registry.overclaim(chunk(5, 5), f2, a2), ClaimResult::Success);
        assert_eq!(fx.registry.owner_of(&chunk(5, 5)), Some(f2));
        assert_eq!(fx.registry.claim_count(f1), 1);
        assert_eq!(fx.registry.claim_count(f2), 1);
    }

    #[test]
    fn overclaim_fails_without_power_margin() {
        let fx = fixture();
        let (f1, a1) = faction_with_power(&fx, "F1", dec!(4));
        let (f2, a2) = faction_with_power(&fx, "F2", dec!(4));

        fx.registry.claim(chunk(5, 5), f1, a1);
        fx.relations.set_enemy(f2, f1);

        // Equal power: margin not cleared.
        assert_eq!(
            fx.registry.overclaim(chunk(5, 5), f2, a2),
            ClaimResult::PowerTooLow
        );

        // Strong attacker, but defender's power still covers its claims.
        fx.ledger.set(f2, dec!(20));
        assert_eq!(
            fx.registry.overclaim(chunk(5, 5), f2, a2),
            ClaimResult::PowerTooLow
        );
    }

    #[test]
    fn overclaim_against_wilderness_fails() {
        let fx = fixture();
        let (f2, a2) = faction_with_power(&fx, "F2", dec!(20));
        assert_eq!(fx.registry.overclaim(chunk(9, 9), f2, a2), ClaimResult::NotOwned);
    }

    #[test]
    fn release_all_clears_the_faction() {
        let fx = fixture();
        let (f1, a1) = faction_with_power(&fx, "F1", dec!(10));
        fx.registry.claim(chunk(0, 0), f1, a1);
        fx.registry.claim(chunk(0, 1), f1, a1);

        assert_eq!(fx.registry.release_all(f1), 2);
        assert_eq!(fx.registry.claim_count(f1), 0);
        assert_eq!(fx.registry.owner_of(&chunk(0, 0)), None);
    }

    #[test]
    fn concurrent_claims_have_one_winner() {
        let fx = fixture();
        let (f1, a1) = faction_with_power(&fx, "F1", dec!(100));
        let (f2, a2) = faction_with_power(&fx, "F2", dec!(100));

        let results = std::thread::scope(|scope| {
            let registry = &fx.registry;
            let target = chunk(5, 5);
            let h1 = {
                let target = target.clone();
                scope.spawn(move || registry.claim(target, f1, a1))
            };
            let h2 = {
                let target = target.clone();
                scope.spawn(move || registry.claim(target, f2, a2))
            };
            [h1.join(), h2.join()]
        });

        let outcomes: Vec<ClaimResult> = results.into_iter().map(|r| r.unwrap()).collect();
        let winners = outcomes
            .iter()
            .filter(|r| **r == ClaimResult::Success)
            .count();
        let losers = outcomes
            .iter()
            .filter(|r| **r == ClaimResult::AlreadyOwned)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(losers, 1);
        assert!(fx.registry.owner_of(&chunk(5, 5)).is_some());
    }

    #[test]
    fn export_restore_roundtrip() {
        let fx = fixture();
        let (f1, a1) = faction_with_power(&fx, "F1", dec!(10));
        fx.registry.claim(chunk(0, 0), f1, a1);
        fx.registry.claim(chunk(0, 1), f1, a1);

        let records = fx.registry.export();
        assert_eq!(records.len(), 2);

        let fresh = fixture();
        for record in records {
            fresh.registry.restore(record);
        }
        assert_eq!(fresh.registry.owner_of(&chunk(0, 0)), Some(f1));
        assert_eq!(fresh.registry.claim_count(f1), 2);
    }
}
