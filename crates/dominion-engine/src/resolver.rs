//! The protection resolver: one ordered precedence function deciding
//! every world-mutation attempt.
//!
//! The verdict is computed from four sources -- bypass capability, zone
//! overlay, chunk ownership plus relation, and combat state -- evaluated
//! in a fixed order with first match winning:
//!
//! 1. Administrative bypass (external permission oracle).
//! 2. Zone override. Build/interact/container are decided entirely by the
//!    zone's effective flag. For PvP, a war zone with PvP enabled forces
//!    the damage through and a safe zone forces denial; a war zone with
//!    PvP disabled is no override and falls through.
//! 3. For block actions: ownership. Wilderness allows; own claim allows;
//!    a foreign claim resolves through the relation graph (allies need
//!    the owner's ally-permission flag, enemies and neutrals are denied).
//! 4. For PvP: spawn protection shields the defender, then friendly fire
//!    (same faction or allied factions) is denied, otherwise allowed.
//!
//! The resolver performs lookups only; it never mutates state. Callers
//! apply their own feedback, and the combat state machine owns the
//! transitions a hostile act triggers.

use std::sync::Arc;

use dominion_relations::{FactionCatalog, RelationGraph};
use dominion_territory::{ChunkOwnershipRegistry, ZoneOverlayStore};
use dominion_types::{ActionKind, ChunkKey, PlayerId, RelationType, Verdict, WorldId, ZoneKind};

use crate::combat::CombatStateMachine;
use crate::hooks::PermissionOracle;

/// The verdict function over the engine's stores.
pub struct ProtectionResolver {
    oracle: Arc<dyn PermissionOracle>,
    zones: Arc<ZoneOverlayStore>,
    claims: Arc<ChunkOwnershipRegistry>,
    relations: Arc<RelationGraph>,
    catalog: Arc<FactionCatalog>,
    combat: Arc<CombatStateMachine>,
    bypass_node: String,
}

impl core::fmt::Debug for ProtectionResolver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProtectionResolver")
            .field("bypass_node", &self.bypass_node)
            .finish_non_exhaustive()
    }
}

impl ProtectionResolver {
    /// Wire the resolver to its stores.
    pub fn new(
        oracle: Arc<dyn PermissionOracle>,
        zones: Arc<ZoneOverlayStore>,
        claims: Arc<ChunkOwnershipRegistry>,
        relations: Arc<RelationGraph>,
        catalog: Arc<FactionCatalog>,
        combat: Arc<CombatStateMachine>,
        bypass_node: impl Into<String>,
    ) -> Self {
        Self {
            oracle,
            zones,
            claims,
            relations,
            catalog,
            combat,
            bypass_node: bypass_node.into(),
        }
    }

    /// Decide whether `actor` may perform `action` in the given chunk.
    pub fn resolve(&self, actor: PlayerId, chunk: &ChunkKey, action: ActionKind) -> Verdict {
        if self.oracle.has_permission(actor, &self.bypass_node) {
            return Verdict::AllowedBypass;
        }

        if let Some(zone) = self.zones.zone_at(chunk) {
            match action {
                ActionKind::Pvp(_) => match zone.kind {
                    ZoneKind::Safe => return Verdict::DeniedSafezone,
                    ZoneKind::War => {
                        if ZoneOverlayStore::effective_flag(&zone, action.zone_flag()) {
                            return Verdict::AllowedWarzone;
                        }
                        // War zone with PvP off: no override, fall through.
                    }
                },
                ActionKind::Build | ActionKind::Interact | ActionKind::Container => {
                    // The zone flag decides entirely, overriding claims.
                    return if ZoneOverlayStore::effective_flag(&zone, action.zone_flag()) {
                        Verdict::AllowedZone
                    } else {
                        Verdict::DeniedZone
                    };
                }
            }
        }

        match action {
            ActionKind::Pvp(defender) => self.resolve_pvp(actor, defender),
            ActionKind::Build | ActionKind::Interact | ActionKind::Container => {
                self.resolve_block_action(actor, chunk, action)
            }
        }
    }

    /// Convenience wrapper taking block coordinates.
    pub fn resolve_at(
        &self,
        actor: PlayerId,
        world: WorldId,
        block_x: i32,
        block_z: i32,
        action: ActionKind,
    ) -> Verdict {
        let chunk = ChunkKey::containing(world, block_x, block_z);
        self.resolve(actor, &chunk, action)
    }

    /// Ownership and relation rules for build/interact/container.
    fn resolve_block_action(&self, actor: PlayerId, chunk: &ChunkKey, action: ActionKind) -> Verdict {
        let Some(owner) = self.claims.owner_of(chunk) else {
            return Verdict::AllowedWilderness;
        };

        let actor_faction = self.catalog.faction_of(actor);
        if actor_faction == Some(owner) {
            return Verdict::AllowedOwnClaim;
        }

        let relation = actor_faction
            .map(|faction| self.relations.relation_between(faction, owner))
            .unwrap_or(RelationType::Neutral);
        match relation {
            RelationType::Ally => {
                if self.catalog.ally_permissions_of(owner).grants(action) {
                    Verdict::AllowedAllyClaim
                } else {
                    Verdict::DeniedNoPermission
                }
            }
            RelationType::Enemy => Verdict::DeniedEnemyClaim,
            RelationType::Neutral => Verdict::DeniedNotMember,
        }
    }

    /// PvP rules outside any zone override.
    fn resolve_pvp(&self, attacker: PlayerId, defender: PlayerId) -> Verdict {
        if self.combat.is_spawn_protected(defender) {
            return Verdict::DeniedSpawnProtected;
        }

        let attacker_faction = self.catalog.faction_of(attacker);
        let defender_faction = self.catalog.faction_of(defender);
        if let (Some(a), Some(d)) = (attacker_faction, defender_faction) {
            if a == d || self.relations.relation_between(a, d) == RelationType::Ally {
                return Verdict::DeniedFriendlyFire;
            }
        }
        Verdict::Allowed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::config::CombatConfig;
    use crate::hooks::DenyAllPermissions;
    use dashmap::DashMap;
    use dominion_territory::{ClaimRules, PowerLedger};
    use dominion_types::{AllyPermissions, FactionId, ZoneFlag};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[derive(Debug, Default)]
    struct StubLedger {
        power: DashMap<FactionId, Decimal>,
    }

    impl PowerLedger for StubLedger {
        fn faction_power(&self, faction: FactionId) -> Decimal {
            self.power.get(&faction).map(|p| *p).unwrap_or_default()
        }
    }

    /// Oracle granting every node to a fixed set of players.
    #[derive(Debug, Default)]
    struct GrantAllTo {
        players: Vec<PlayerId>,
    }

    impl PermissionOracle for GrantAllTo {
        fn has_permission(&self, player: PlayerId, _node: &str) -> bool {
            self.players.contains(&player)
        }
    }

    struct Fixture {
        resolver: ProtectionResolver,
        catalog: Arc<FactionCatalog>,
        relations: Arc<RelationGraph>,
        zones: Arc<ZoneOverlayStore>,
        claims: Arc<ChunkOwnershipRegistry>,
        combat: Arc<CombatStateMachine>,
        clock: Arc<ManualClock>,
        ledger: Arc<StubLedger>,
    }

    fn fixture_with_oracle(oracle: Arc<dyn PermissionOracle>) -> Fixture {
        let clock = Arc::new(ManualClock::default());
        let catalog = Arc::new(FactionCatalog::new());
        let relations = Arc::new(RelationGraph::default());
        let zones = Arc::new(ZoneOverlayStore::new());
        let ledger = Arc::new(StubLedger::default());
        let claims = Arc::new(ChunkOwnershipRegistry::new(
            ClaimRules::default(),
            Arc::clone(&catalog),
            Arc::clone(&relations),
            Arc::clone(&zones),
            Arc::clone(&ledger) as Arc<dyn PowerLedger>,
        ));
        let combat = Arc::new(CombatStateMachine::new(
            CombatConfig::default(),
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));
        let resolver = ProtectionResolver::new(
            oracle,
            Arc::clone(&zones),
            Arc::clone(&claims),
            Arc::clone(&relations),
            Arc::clone(&catalog),
            Arc::clone(&combat),
            "dominion.bypass",
        );
        Fixture {
            resolver,
            catalog,
            relations,
            zones,
            claims,
            combat,
            clock,
            ledger,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_oracle(Arc::new(DenyAllPermissions))
    }

    fn chunk(x: i32, z: i32) -> ChunkKey {
        ChunkKey::new(WorldId::new("overworld"), x, z)
    }

    fn faction(fx: &Fixture, name: &str) -> (FactionId, PlayerId) {
        let owner = PlayerId::new();
        let id = fx.catalog.create(name, owner).unwrap();
        fx.ledger.power.insert(id, dec!(100));
        (id, owner)
    }

    #[test]
    fn wilderness_allows_block_actions() {
        let fx = fixture();
        let verdict = fx.resolver.resolve(PlayerId::new(), &chunk(0, 0), ActionKind::Build);
        assert_eq!(verdict, Verdict::AllowedWilderness);
        assert!(verdict.allowed());
    }

    #[test]
    fn own_claim_allows_any_member() {
        let fx = fixture();
        let (f1, officer) = faction(&fx, "F1");
        fx.claims.claim(chunk(1, 1), f1, officer);

        let grunt = PlayerId::new();
        fx.catalog
            .add_member(f1, grunt, dominion_types::FactionRole::Member)
            .unwrap();
        assert_eq!(
            fx.resolver.resolve(grunt, &chunk(1, 1), ActionKind::Container),
            Verdict::AllowedOwnClaim
        );
    }

    #[test]
    fn foreign_claim_denies_by_relation() {
        let fx = fixture();
        let (f1, officer) = faction(&fx, "F1");
        let (f2, outsider) = faction(&fx, "F2");
        fx.claims.claim(chunk(1, 1), f1, officer);

        // Neutral faction member and factionless player alike.
        assert_eq!(
            fx.resolver.resolve(outsider, &chunk(1, 1), ActionKind::Build),
            Verdict::DeniedNotMember
        );
        assert_eq!(
            fx.resolver.resolve(PlayerId::new(), &chunk(1, 1), ActionKind::Build),
            Verdict::DeniedNotMember
        );

        fx.relations.set_enemy(f2, f1);
        assert_eq!(
            fx.resolver.resolve(outsider, &chunk(1, 1), ActionKind::Build),
            Verdict::DeniedEnemyClaim
        );
    }

    #[test]
    fn ally_access_follows_owner_permissions() {
        let fx = fixture();
        let (f1, officer) = faction(&fx, "F1");
        let (f2, ally) = faction(&fx, "F2");
        fx.claims.claim(chunk(1, 1), f1, officer);
        fx.relations.request_ally(f1, f2);
        fx.relations.request_ally(f2, f1);

        // All ally permissions default off.
        assert_eq!(
            fx.resolver.resolve(ally, &chunk(1, 1), ActionKind::Interact),
            Verdict::DeniedNoPermission
        );

        fx.catalog
            .set_ally_permissions(
                f1,
                AllyPermissions {
                    build: true,
                    interact: true,
                    container: false,
                },
            )
            .unwrap();
        assert_eq!(
            fx.resolver.resolve(ally, &chunk(1, 1), ActionKind::Build),
            Verdict::AllowedAllyClaim
        );
        assert_eq!(
            fx.resolver.resolve(ally, &chunk(1, 1), ActionKind::Interact),
            Verdict::AllowedAllyClaim
        );
        assert_eq!(
            fx.resolver.resolve(ally, &chunk(1, 1), ActionKind::Container),
            Verdict::DeniedNoPermission
        );
    }

    #[test]
    fn bypass_overrides_everything() {
        let admin = PlayerId::new();
        let fx = fixture_with_oracle(Arc::new(GrantAllTo {
            players: vec![admin],
        }));
        let (f1, officer) = faction(&fx, "F1");
        fx.claims.claim(chunk(1, 1), f1, officer);
        fx.relations.set_enemy(f1, fx.catalog.create("F2", PlayerId::new()).unwrap());

        assert_eq!(
            fx.resolver.resolve(admin, &chunk(1, 1), ActionKind::Build),
            Verdict::AllowedBypass
        );

        // Even a safe zone yields to the bypass.
        let spawn = fx.zones.create_zone("spawn", ZoneKind::Safe);
        fx.zones.annex_chunk(spawn, chunk(2, 2)).unwrap();
        assert_eq!(
            fx.resolver.resolve(admin, &chunk(2, 2), ActionKind::Pvp(PlayerId::new())),
            Verdict::AllowedBypass
        );
    }

    #[test]
    fn zone_flag_decides_block_actions_entirely() {
        let fx = fixture();
        let (f1, officer) = faction(&fx, "F1");
        fx.claims.claim(chunk(1, 1), f1, officer);

        // Zoning the claimed chunk makes the zone flag authoritative even
        // for the owning faction.
        let spawn = fx.zones.create_zone("spawn", ZoneKind::Safe);
        fx.zones.annex_chunk(spawn, chunk(1, 1)).unwrap();
        assert_eq!(
            fx.resolver.resolve(officer, &chunk(1, 1), ActionKind::Build),
            Verdict::DeniedZone
        );

        fx.zones.set_flag(spawn, ZoneFlag::Build, Some(true)).unwrap();
        assert_eq!(
            fx.resolver.resolve(PlayerId::new(), &chunk(1, 1), ActionKind::Build),
            Verdict::AllowedZone
        );
    }

    #[test]
    fn safezone_denies_pvp_warzone_forces_it() {
        let fx = fixture();
        let (f1, a) = faction(&fx, "F1");
        let (f2, b) = faction(&fx, "F2");
        // Allies: friendly fire would normally be denied.
        fx.relations.request_ally(f1, f2);
        fx.relations.request_ally(f2, f1);

        let spawn = fx.zones.create_zone("spawn", ZoneKind::Safe);
        fx.zones.annex_chunk(spawn, chunk(0, 0)).unwrap();
        assert_eq!(
            fx.resolver.resolve(a, &chunk(0, 0), ActionKind::Pvp(b)),
            Verdict::DeniedSafezone
        );

        let arena = fx.zones.create_zone("arena", ZoneKind::War);
        fx.zones.annex_chunk(arena, chunk(5, 5)).unwrap();
        assert_eq!(
            fx.resolver.resolve(a, &chunk(5, 5), ActionKind::Pvp(b)),
            Verdict::AllowedWarzone
        );
    }

    #[test]
    fn warzone_with_pvp_off_falls_through() {
        let fx = fixture();
        let (f1, a) = faction(&fx, "F1");
        let (f2, b) = faction(&fx, "F2");
        fx.relations.request_ally(f1, f2);
        fx.relations.request_ally(f2, f1);

        let arena = fx.zones.create_zone("arena", ZoneKind::War);
        fx.zones.annex_chunk(arena, chunk(5, 5)).unwrap();
        fx.zones.set_flag(arena, ZoneFlag::PvpEnabled, Some(false)).unwrap();

        // No override: normal PvP rules apply, and the alliance denies.
        assert_eq!(
            fx.resolver.resolve(a, &chunk(5, 5), ActionKind::Pvp(b)),
            Verdict::DeniedFriendlyFire
        );
    }

    #[test]
    fn spawn_protection_shields_the_defender() {
        let fx = fixture();
        let attacker = PlayerId::new();
        let defender = PlayerId::new();
        fx.combat.on_respawn(defender, chunk(0, 0));

        assert_eq!(
            fx.resolver.resolve(attacker, &chunk(0, 0), ActionKind::Pvp(defender)),
            Verdict::DeniedSpawnProtected
        );

        // Protection lapses with time.
        fx.clock.advance(60_000);
        assert_eq!(
            fx.resolver.resolve(attacker, &chunk(0, 0), ActionKind::Pvp(defender)),
            Verdict::Allowed
        );
    }

    #[test]
    fn friendly_fire_denied_in_and_between_factions() {
        let fx = fixture();
        let (f1, a) = faction(&fx, "F1");
        let mate = PlayerId::new();
        fx.catalog
            .add_member(f1, mate, dominion_types::FactionRole::Member)
            .unwrap();
        assert_eq!(
            fx.resolver.resolve(a, &chunk(0, 0), ActionKind::Pvp(mate)),
            Verdict::DeniedFriendlyFire
        );

        let (f2, b) = faction(&fx, "F2");
        fx.relations.request_ally(f1, f2);
        fx.relations.request_ally(f2, f1);
        assert_eq!(
            fx.resolver.resolve(a, &chunk(0, 0), ActionKind::Pvp(b)),
            Verdict::DeniedFriendlyFire
        );

        // Neutral parties may fight outside zones.
        fx.relations.set_neutral(f1, f2);
        assert_eq!(
            fx.resolver.resolve(a, &chunk(0, 0), ActionKind::Pvp(b)),
            Verdict::Allowed
        );
    }

    #[test]
    fn resolve_at_maps_block_coordinates() {
        let fx = fixture();
        let (f1, officer) = faction(&fx, "F1");
        fx.claims.claim(chunk(2, -3), f1, officer);

        // Block (40, -41) lies in chunk (2, -3).
        assert_eq!(
            fx.resolver
                .resolve_at(officer, WorldId::new("overworld"), 40, -41, ActionKind::Build),
            Verdict::AllowedOwnClaim
        );
    }
}
