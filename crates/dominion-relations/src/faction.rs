//! The faction catalog: the directory of factions this engine consults.
//!
//! Factions live here as plain data keyed by id (arena-and-id, per the
//! no-cyclic-references rule); a reverse index answers "which faction is
//! this player in" without scanning. The catalog owns membership roles,
//! the faction home, and ally-permission flags -- nothing else. Currency,
//! chat, and command handling belong to the hosting environment.

use dashmap::DashMap;
use tracing::debug;

use dominion_types::{AllyPermissions, BlockPos, Faction, FactionId, FactionRole, PlayerId};

/// Faults in catalog administration.
///
/// These are caller-contract violations, not gameplay outcomes; gameplay
/// outcomes stay in the closed result enums.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    /// No faction with the given id exists.
    #[error("unknown faction: {0}")]
    UnknownFaction(FactionId),

    /// The faction name is already taken.
    #[error("faction name already taken: {0}")]
    NameTaken(String),

    /// The player already belongs to a faction.
    #[error("player {0} is already in a faction")]
    AlreadyInFaction(PlayerId),

    /// The player does not belong to the named faction.
    #[error("player {player} is not a member of faction {faction}")]
    NotAMember {
        /// The player in question.
        player: PlayerId,
        /// The faction in question.
        faction: FactionId,
    },
}

/// The concurrent faction directory.
#[derive(Debug, Default)]
pub struct FactionCatalog {
    /// All factions by id.
    factions: DashMap<FactionId, Faction>,
    /// Reverse membership index.
    by_player: DashMap<PlayerId, FactionId>,
    /// Name uniqueness index (lowercased name -> id).
    by_name: DashMap<String, FactionId>,
}

impl FactionCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a faction with `owner` as its sole member.
    ///
    /// # Errors
    ///
    /// [`CatalogError::NameTaken`] if another faction holds the name
    /// (case-insensitive), [`CatalogError::AlreadyInFaction`] if the owner
    /// already belongs to a faction.
    pub fn create(&self, name: &str, owner: PlayerId) -> Result<FactionId, CatalogError> {
        if self.by_player.contains_key(&owner) {
            return Err(CatalogError::AlreadyInFaction(owner));
        }
        let key = name.to_lowercase();
        let id = FactionId::new();
        // The name index entry doubles as the creation lock: the first
        // inserter wins, a racing duplicate sees the occupied entry.
        match self.by_name.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(CatalogError::NameTaken(name.to_owned()));
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(id);
            }
        }
        self.factions.insert(id, Faction::new(id, name, owner));
        self.by_player.insert(owner, id);
        debug!(%id, name, %owner, "Faction created");
        Ok(id)
    }

    /// Remove a faction and all membership entries.
    ///
    /// Claims and relation edges referencing the faction are the caller's
    /// responsibility (the server context cascades those).
    ///
    /// # Errors
    ///
    /// [`CatalogError::UnknownFaction`] if no such faction exists.
    pub fn disband(&self, id: FactionId) -> Result<Faction, CatalogError> {
        let Some((_, faction)) = self.factions.remove(&id) else {
            return Err(CatalogError::UnknownFaction(id));
        };
        for player in faction.members.keys() {
            self.by_player.remove_if(player, |_, mapped| *mapped == id);
        }
        self.by_name.remove_if(&faction.name.to_lowercase(), |_, mapped| *mapped == id);
        debug!(%id, name = %faction.name, "Faction disbanded");
        Ok(faction)
    }

    /// Add `player` to the faction with the given role.
    ///
    /// # Errors
    ///
    /// [`CatalogError::UnknownFaction`] or [`CatalogError::AlreadyInFaction`].
    pub fn add_member(
        &self,
        id: FactionId,
        player: PlayerId,
        role: FactionRole,
    ) -> Result<(), CatalogError> {
        if self.by_player.contains_key(&player) {
            return Err(CatalogError::AlreadyInFaction(player));
        }
        let Some(mut faction) = self.factions.get_mut(&id) else {
            return Err(CatalogError::UnknownFaction(id));
        };
        faction.members.insert(player, role);
        drop(faction);
        self.by_player.insert(player, id);
        Ok(())
    }

    /// Remove `player` from their faction, if any. Returns the faction left.
    pub fn remove_member(&self, player: PlayerId) -> Option<FactionId> {
        let (_, id) = self.by_player.remove(&player)?;
        if let Some(mut faction) = self.factions.get_mut(&id) {
            faction.members.remove(&player);
        }
        Some(id)
    }

    /// The faction `player` belongs to, if any.
    pub fn faction_of(&self, player: PlayerId) -> Option<FactionId> {
        self.by_player.get(&player).map(|id| *id)
    }

    /// The role `player` holds in their faction, if any.
    pub fn role_of(&self, player: PlayerId) -> Option<FactionRole> {
        let id = self.faction_of(player)?;
        self.role_in(id, player)
    }

    /// The role `player` holds in the specific faction, if a member.
    pub fn role_in(&self, id: FactionId, player: PlayerId) -> Option<FactionRole> {
        self.factions.get(&id).and_then(|f| f.role_of(player))
    }

    /// A clone of the faction record.
    pub fn get(&self, id: FactionId) -> Option<Faction> {
        self.factions.get(&id).map(|f| f.clone())
    }

    /// Whether a faction with this id exists.
    pub fn contains(&self, id: FactionId) -> bool {
        self.factions.contains_key(&id)
    }

    /// Look up a faction id by name (case-insensitive).
    pub fn find_by_name(&self, name: &str) -> Option<FactionId> {
        self.by_name.get(&name.to_lowercase()).map(|id| *id)
    }

    /// Set or clear the faction home.
    ///
    /// # Errors
    ///
    /// [`CatalogError::UnknownFaction`] if no such faction exists.
    pub fn set_home(&self, id: FactionId, home: Option<BlockPos>) -> Result<(), CatalogError> {
        let Some(mut faction) = self.factions.get_mut(&id) else {
            return Err(CatalogError::UnknownFaction(id));
        };
        faction.home = home;
        Ok(())
    }

    /// The faction home, if the faction exists and has one.
    pub fn home_of(&self, id: FactionId) -> Option<BlockPos> {
        self.factions.get(&id).and_then(|f| f.home.clone())
    }

    /// Replace the faction's ally-permission flags.
    ///
    /// # Errors
    ///
    /// [`CatalogError::UnknownFaction`] if no such faction exists.
    pub fn set_ally_permissions(
        &self,
        id: FactionId,
        permissions: AllyPermissions,
    ) -> Result<(), CatalogError> {
        let Some(mut faction) = self.factions.get_mut(&id) else {
            return Err(CatalogError::UnknownFaction(id));
        };
        faction.ally_permissions = permissions;
        Ok(())
    }

    /// The faction's ally-permission flags (defaults if unknown faction).
    pub fn ally_permissions_of(&self, id: FactionId) -> AllyPermissions {
        self.factions
            .get(&id)
            .map(|f| f.ally_permissions)
            .unwrap_or_default()
    }

    /// Export all factions for persistence.
    pub fn export(&self) -> Vec<Faction> {
        self.factions.iter().map(|f| f.clone()).collect()
    }

    /// Restore one persisted faction, rebuilding the indexes.
    pub fn restore(&self, faction: Faction) {
        for player in faction.members.keys() {
            self.by_player.insert(*player, faction.id);
        }
        self.by_name.insert(faction.name.to_lowercase(), faction.id);
        self.factions.insert(faction.id, faction);
    }

    /// Number of factions in the catalog.
    pub fn len(&self) -> usize {
        self.factions.len()
    }

    /// Whether the catalog holds no factions.
    pub fn is_empty(&self) -> bool {
        self.factions.is_empty()
    }
}
