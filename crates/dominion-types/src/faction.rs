//! Faction data: membership roles, home, and ally permissions.
//!
//! Factions are owned by the hosting environment and referenced by id
//! everywhere else in the engine (arena-and-id, never embedded object
//! references). These structs are the slice of faction state this engine
//! actually consumes: who is in it with what role, where its home is,
//! and which actions it grants to allies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::chunk::BlockPos;
use crate::enums::{ActionKind, FactionRole};
use crate::ids::{FactionId, PlayerId};

/// Which actions a faction grants to members of allied factions inside
/// its territory. All default off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllyPermissions {
    /// Allies may place and break blocks.
    pub build: bool,
    /// Allies may use doors, levers, and similar.
    pub interact: bool,
    /// Allies may open containers.
    pub container: bool,
}

impl AllyPermissions {
    /// Whether the given action is granted to allies.
    ///
    /// PvP is never an ally permission; friendly fire has its own rule in
    /// the resolver.
    pub const fn grants(self, action: ActionKind) -> bool {
        match action {
            ActionKind::Build => self.build,
            ActionKind::Interact => self.interact,
            ActionKind::Container => self.container,
            ActionKind::Pvp(_) => false,
        }
    }
}

/// A faction as this engine sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faction {
    /// Stable identifier.
    pub id: FactionId,
    /// Human-readable name (uniqueness enforced by the catalog).
    pub name: String,
    /// Member roster with roles.
    pub members: BTreeMap<PlayerId, FactionRole>,
    /// Faction home, if set. Teleport destination for members.
    pub home: Option<BlockPos>,
    /// Actions granted to allied factions inside this faction's claims.
    pub ally_permissions: AllyPermissions,
}

impl Faction {
    /// Create a faction with a single owner and no home.
    pub fn new(id: FactionId, name: impl Into<String>, owner: PlayerId) -> Self {
        let mut members = BTreeMap::new();
        members.insert(owner, FactionRole::Owner);
        Self {
            id,
            name: name.into(),
            members,
            home: None,
            ally_permissions: AllyPermissions::default(),
        }
    }

    /// The role of `player` in this faction, if a member.
    pub fn role_of(&self, player: PlayerId) -> Option<FactionRole> {
        self.members.get(&player).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_faction_has_one_owner() {
        let owner = PlayerId::new();
        let faction = Faction::new(FactionId::new(), "Ironhold", owner);
        assert_eq!(faction.role_of(owner), Some(FactionRole::Owner));
        assert_eq!(faction.members.len(), 1);
        assert!(faction.home.is_none());
    }

    #[test]
    fn ally_permissions_never_grant_pvp() {
        let perms = AllyPermissions {
            build: true,
            interact: true,
            container: true,
        };
        assert!(perms.grants(ActionKind::Build));
        assert!(!perms.grants(ActionKind::Pvp(PlayerId::new())));
    }
}
