//! The server context: one explicitly-wired facade over every store.
//!
//! All engine state hangs off this struct; there are no globals and no
//! service registry. The hosting environment constructs it once with its
//! own oracle, ledger, sink, clock, and scheduler, then routes gameplay
//! events and administrative commands through the methods here. Each
//! method is a thin orchestration over the underlying stores, which stay
//! independently usable and testable.

use std::sync::Arc;

use tracing::{info, warn};

use dominion_relations::{CatalogError, FactionCatalog, RelationGraph, RelationLimits};
use dominion_territory::{ChunkOwnershipRegistry, ClaimRules, ZoneOverlayStore};
use dominion_types::{
    ActionKind, BlockPos, ChunkKey, ClaimResult, FactionId, HomeResult, PlayerId, RelationResult,
    TeleportResult, TerritorySnapshot, Verdict, WorldId,
};

use crate::clock::Clock;
use crate::combat::CombatStateMachine;
use crate::config::DominionConfig;
use crate::hooks::{MessageSink, PermissionOracle, PersistenceError, PersistenceStore, PowerLedger};
use crate::resolver::ProtectionResolver;
use crate::scheduler::Scheduler;
use crate::teleport::{TeleportCoordinator, TeleportExecutor};

/// What a snapshot import kept and dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Factions restored into the catalog.
    pub factions: usize,
    /// Claims restored.
    pub claims: usize,
    /// Claims dropped because their owner faction is unknown.
    pub skipped_claims: usize,
    /// Zones restored.
    pub zones: usize,
    /// Relation edges restored.
    pub relations: usize,
    /// Relation edges dropped because a side is unknown or degenerate.
    pub skipped_relations: usize,
}

/// The explicitly-wired engine facade.
pub struct ServerContext {
    config: DominionConfig,
    catalog: Arc<FactionCatalog>,
    relations: Arc<RelationGraph>,
    zones: Arc<ZoneOverlayStore>,
    claims: Arc<ChunkOwnershipRegistry>,
    combat: Arc<CombatStateMachine>,
    resolver: Arc<ProtectionResolver>,
    teleport: Arc<TeleportCoordinator>,
    scheduler: Arc<dyn Scheduler>,
}

impl core::fmt::Debug for ServerContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ServerContext")
            .field("factions", &self.catalog.len())
            .field("zones", &self.zones.len())
            .finish_non_exhaustive()
    }
}

impl ServerContext {
    /// Wire a context from configuration and the host-provided boundary
    /// implementations.
    pub fn new(
        config: DominionConfig,
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn Scheduler>,
        oracle: Arc<dyn PermissionOracle>,
        power: Arc<dyn PowerLedger>,
        messages: Arc<dyn MessageSink>,
    ) -> Arc<Self> {
        let catalog = Arc::new(FactionCatalog::new());
        let relations = Arc::new(RelationGraph::new(RelationLimits {
            max_allies: config.relations.max_allies,
            max_enemies: config.relations.max_enemies,
        }));
        let zones = Arc::new(ZoneOverlayStore::new());
        let claims = Arc::new(ChunkOwnershipRegistry::new(
            ClaimRules {
                power_per_claim: config.territory.power_per_claim,
                overclaim_power_margin: config.territory.overclaim_power_margin,
                require_adjacency: config.territory.require_adjacency,
            },
            Arc::clone(&catalog),
            Arc::clone(&relations),
            Arc::clone(&zones),
            power,
        ));
        let combat = Arc::new(CombatStateMachine::new(config.combat, Arc::clone(&clock)));
        let resolver = Arc::new(ProtectionResolver::new(
            oracle,
            Arc::clone(&zones),
            Arc::clone(&claims),
            Arc::clone(&relations),
            Arc::clone(&catalog),
            Arc::clone(&combat),
            config.permissions.bypass_node.clone(),
        ));
        let teleport = Arc::new(TeleportCoordinator::new(
            config.teleport,
            clock,
            Arc::clone(&scheduler),
            Arc::clone(&catalog),
            Arc::clone(&combat),
            messages,
        ));
        Arc::new(Self {
            config,
            catalog,
            relations,
            zones,
            claims,
            combat,
            resolver,
            teleport,
            scheduler,
        })
    }

    /// The faction catalog.
    pub const fn catalog(&self) -> &Arc<FactionCatalog> {
        &self.catalog
    }

    /// The relation graph.
    pub const fn relations(&self) -> &Arc<RelationGraph> {
        &self.relations
    }

    /// The zone overlay.
    pub const fn zones(&self) -> &Arc<ZoneOverlayStore> {
        &self.zones
    }

    /// The chunk ownership registry.
    pub const fn claims(&self) -> &Arc<ChunkOwnershipRegistry> {
        &self.claims
    }

    /// The combat state machine.
    pub const fn combat(&self) -> &Arc<CombatStateMachine> {
        &self.combat
    }

    /// The teleport coordinator.
    pub const fn teleport(&self) -> &Arc<TeleportCoordinator> {
        &self.teleport
    }

    /// The active configuration.
    pub const fn config(&self) -> &DominionConfig {
        &self.config
    }

    // --- protection ---

    /// Decide whether `actor` may perform `action` in the chunk.
    pub fn resolve(&self, actor: PlayerId, chunk: &ChunkKey, action: ActionKind) -> Verdict {
        self.resolver.resolve(actor, chunk, action)
    }

    /// [`resolve`](Self::resolve) from block coordinates.
    pub fn resolve_at(
        &self,
        actor: PlayerId,
        world: WorldId,
        block_x: i32,
        block_z: i32,
        action: ActionKind,
    ) -> Verdict {
        self.resolver.resolve_at(actor, world, block_x, block_z, action)
    }

    /// Resolve a PvP damage attempt and, when it is allowed, apply the
    /// combat consequences: both players become tagged and any pending
    /// warmup teleports are cancelled.
    pub fn attempt_pvp_damage(
        &self,
        attacker: PlayerId,
        defender: PlayerId,
        chunk: &ChunkKey,
    ) -> Verdict {
        let verdict = self.resolver.resolve(attacker, chunk, ActionKind::Pvp(defender));
        if verdict.allowed() {
            self.tag(attacker, defender);
        }
        verdict
    }

    // --- territory ---

    /// Claim the chunk for the actor's faction.
    pub fn claim(&self, actor: PlayerId, chunk: ChunkKey) -> ClaimResult {
        let Some(faction) = self.catalog.faction_of(actor) else {
            return ClaimResult::NotInFaction;
        };
        self.claims.claim(chunk, faction, actor)
    }

    /// Return a chunk owned by the actor's faction to wilderness.
    pub fn unclaim(&self, actor: PlayerId, chunk: &ChunkKey) -> ClaimResult {
        self.claims.unclaim(chunk, actor)
    }

    /// Forcibly take an enemy-owned chunk for the actor's faction.
    pub fn overclaim(&self, actor: PlayerId, chunk: ChunkKey) -> ClaimResult {
        let Some(faction) = self.catalog.faction_of(actor) else {
            return ClaimResult::NotInFaction;
        };
        self.claims.overclaim(chunk, faction, actor)
    }

    // --- diplomacy ---

    /// Request (or reciprocate) an alliance between two factions.
    pub fn request_ally(&self, requester: FactionId, target: FactionId) -> RelationResult {
        if let Some(unknown) = self.check_factions_known(requester, target) {
            return unknown;
        }
        self.relations.request_ally(requester, target)
    }

    /// Declare the target an enemy of the actor's faction.
    pub fn set_enemy(&self, actor: FactionId, target: FactionId) -> RelationResult {
        if let Some(unknown) = self.check_factions_known(actor, target) {
            return unknown;
        }
        self.relations.set_enemy(actor, target)
    }

    /// Reset the relation between two factions to neutral.
    pub fn set_neutral(&self, actor: FactionId, target: FactionId) -> RelationResult {
        if let Some(unknown) = self.check_factions_known(actor, target) {
            return unknown;
        }
        self.relations.set_neutral(actor, target)
    }

    // --- home and teleport ---

    /// Set the actor's faction home to the given position. The position
    /// must lie inside the faction's own territory.
    pub fn set_home(&self, actor: PlayerId, position: BlockPos) -> HomeResult {
        let Some(faction) = self.catalog.faction_of(actor) else {
            return HomeResult::NotInFaction;
        };
        let is_officer = self
            .catalog
            .role_in(faction, actor)
            .is_some_and(dominion_types::FactionRole::is_officer);
        if !is_officer {
            return HomeResult::NotOfficer;
        }
        if self.claims.owner_of(&position.chunk()) != Some(faction) {
            return HomeResult::NotInOwnTerritory;
        }
        if self.catalog.set_home(faction, Some(position)).is_err() {
            // The faction vanished between the lookups.
            return HomeResult::NotInFaction;
        }
        HomeResult::Success
    }

    /// Request a teleport to the actor's faction home.
    pub fn teleport_to_home(
        &self,
        actor: PlayerId,
        start: &BlockPos,
        executor: Arc<dyn TeleportExecutor>,
    ) -> TeleportResult {
        self.teleport.teleport_to_home(actor, start, executor)
    }

    // --- faction lifecycle ---

    /// Disband a faction and cascade: claims return to wilderness and all
    /// relation edges are purged.
    ///
    /// # Errors
    ///
    /// [`CatalogError::UnknownFaction`] if no such faction exists.
    pub fn disband_faction(&self, faction: FactionId) -> Result<(), CatalogError> {
        let record = self.catalog.disband(faction)?;
        let released = self.claims.release_all(faction);
        self.relations.purge_faction(faction);
        info!(%faction, name = %record.name, released, "Faction disbanded with cascade");
        Ok(())
    }

    /// Apply the combat consequences of a damage event directly, for
    /// hosts that route damage outside [`attempt_pvp_damage`]: both
    /// players become tagged and pending warmup teleports are cancelled.
    ///
    /// [`attempt_pvp_damage`]: Self::attempt_pvp_damage
    pub fn tag(&self, attacker: PlayerId, defender: PlayerId) {
        self.combat.tag(attacker, defender);
        self.teleport.on_combat_tag(attacker);
        self.teleport.on_combat_tag(defender);
    }

    // --- player event routing ---

    /// Route a player movement into `chunk` to the interested stores.
    pub fn on_move(&self, player: PlayerId, chunk: &ChunkKey) {
        self.combat.on_move(player, chunk);
        self.teleport.on_move(player, chunk);
    }

    /// Route a disconnect. Returns `true` when the player combat-logged.
    pub fn on_disconnect(&self, player: PlayerId) -> bool {
        self.teleport.on_disconnect(player);
        self.combat.on_disconnect(player)
    }

    /// Route a respawn at the given anchor chunk.
    pub fn on_respawn(&self, player: PlayerId, anchor: ChunkKey) {
        self.combat.on_respawn(player, anchor);
    }

    // --- background ticks ---

    /// Run one combat decay pass. Returns the number of lapsed entries.
    pub fn combat_decay_tick(&self) -> usize {
        self.combat.decay_tick()
    }

    /// Run one maintenance pass: prune lapsed teleport cooldowns.
    pub fn maintenance_tick(&self) -> usize {
        self.teleport.prune_cooldowns()
    }

    /// Schedule the decay and maintenance ticks to run periodically on the
    /// context's scheduler. Each tick reschedules itself; the chain stops
    /// when the context is dropped.
    pub fn start_background_ticks(self: &Arc<Self>) {
        Self::schedule_recurring(self, self.config.ticks.combat_decay_ms, |context| {
            let lapsed = context.combat_decay_tick();
            if lapsed > 0 {
                tracing::debug!(lapsed, "Combat states decayed");
            }
        });
        Self::schedule_recurring(self, self.config.ticks.maintenance_ms, |context| {
            let pruned = context.maintenance_tick();
            if pruned > 0 {
                tracing::debug!(pruned, "Teleport cooldowns pruned");
            }
        });
    }

    fn schedule_recurring(context: &Arc<Self>, interval_ms: u64, tick: fn(&Self)) {
        if interval_ms == 0 {
            return;
        }
        let weak = Arc::downgrade(context);
        drop(context.scheduler.schedule(
            interval_ms,
            Box::new(move || {
                if let Some(context) = weak.upgrade() {
                    // Reschedule before running so a failing tick cannot
                    // halt the chain.
                    Self::schedule_recurring(&context, interval_ms, tick);
                    tick(&context);
                }
            }),
        ));
    }

    // --- persistence ---

    /// Snapshot every durable store.
    pub fn export_snapshot(&self) -> TerritorySnapshot {
        TerritorySnapshot {
            factions: self.catalog.export(),
            claims: self.claims.export(),
            zones: self.zones.export(),
            relations: self.relations.export(),
        }
    }

    /// Restore a snapshot into the (assumed empty) stores.
    ///
    /// Factions restore first; claims and relation edges naming a faction
    /// the snapshot does not contain are skipped with a warning rather
    /// than failing the whole import.
    pub fn import_snapshot(&self, snapshot: TerritorySnapshot) -> ImportReport {
        let mut report = ImportReport::default();

        for faction in snapshot.factions {
            self.catalog.restore(faction);
            report.factions = report.factions.saturating_add(1);
        }

        for claim in snapshot.claims {
            if self.catalog.contains(claim.owner) {
                self.claims.restore(claim);
                report.claims = report.claims.saturating_add(1);
            } else {
                warn!(chunk = %claim.chunk, owner = %claim.owner, "Skipping claim with unknown owner");
                report.skipped_claims = report.skipped_claims.saturating_add(1);
            }
        }

        for zone in snapshot.zones {
            self.zones.restore(zone);
            report.zones = report.zones.saturating_add(1);
        }

        for relation in snapshot.relations {
            let known =
                self.catalog.contains(relation.faction_a) && self.catalog.contains(relation.faction_b);
            if known && self.relations.restore(&relation) {
                report.relations = report.relations.saturating_add(1);
            } else {
                warn!(
                    a = %relation.faction_a,
                    b = %relation.faction_b,
                    "Skipping relation edge naming an unknown faction"
                );
                report.skipped_relations = report.skipped_relations.saturating_add(1);
            }
        }

        info!(
            factions = report.factions,
            claims = report.claims,
            zones = report.zones,
            relations = report.relations,
            "Snapshot imported"
        );
        report
    }

    /// Save the current state through the persistence boundary.
    ///
    /// # Errors
    ///
    /// Propagates [`PersistenceError`] from the backend.
    pub fn save_to(&self, store: &dyn PersistenceStore) -> Result<(), PersistenceError> {
        store.save(&self.export_snapshot())
    }

    /// Load state through the persistence boundary.
    ///
    /// # Errors
    ///
    /// Propagates [`PersistenceError`] from the backend.
    pub fn load_from(&self, store: &dyn PersistenceStore) -> Result<ImportReport, PersistenceError> {
        Ok(self.import_snapshot(store.load()?))
    }

    /// Membership gate shared by the diplomacy wrappers.
    fn check_factions_known(&self, a: FactionId, b: FactionId) -> Option<RelationResult> {
        if !self.catalog.contains(a) {
            return Some(RelationResult::UnknownFaction(a));
        }
        if !self.catalog.contains(b) {
            return Some(RelationResult::UnknownFaction(b));
        }
        None
    }
}
