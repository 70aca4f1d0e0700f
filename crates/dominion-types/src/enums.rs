//! Enumeration types shared across the Dominion workspace.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Diplomacy
// ---------------------------------------------------------------------------

/// The diplomatic relation between two factions.
///
/// Relations are symmetric by construction: the graph stores one edge per
/// unordered faction pair, so `relation(A, B)` and `relation(B, A)` always
/// agree.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum RelationType {
    /// No special relation. The initial state of every pair.
    #[default]
    Neutral,
    /// Mutual alliance, formed by a reciprocal ally-request handshake.
    Ally,
    /// Declared hostility. Requires no consent from the other side.
    Enemy,
}

// ---------------------------------------------------------------------------
// Membership
// ---------------------------------------------------------------------------

/// A player's role within their faction.
///
/// Roles are consumed, not owned, by this engine: claim and home mutations
/// require at least [`FactionRole::Officer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FactionRole {
    /// Ordinary member.
    Member,
    /// Can claim, unclaim, and manage the faction home.
    Officer,
    /// Full control, including disbanding.
    Owner,
}

impl FactionRole {
    /// Whether this role carries at least officer authority.
    pub const fn is_officer(self) -> bool {
        matches!(self, Self::Officer | Self::Owner)
    }
}

// ---------------------------------------------------------------------------
// Zones
// ---------------------------------------------------------------------------

/// The kind of an administrator-defined zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ZoneKind {
    /// Protected area: hostile actions and world mutation denied by default.
    Safe,
    /// Contested area: PvP forced on by default, claiming excluded.
    War,
}

/// A named boolean flag on a zone.
///
/// Each flag has a documented default per zone kind, used when the flag is
/// unset on a particular zone (see [`ZoneFlag::default_for`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneFlag {
    /// Whether block placement/destruction is allowed in the zone.
    Build,
    /// Whether interaction (doors, levers, beds) is allowed in the zone.
    Interact,
    /// Whether container access (chests, furnaces) is allowed in the zone.
    Container,
    /// Whether player-versus-player damage is enabled in the zone.
    PvpEnabled,
}

impl ZoneFlag {
    /// The documented default value of this flag for a zone of `kind`,
    /// applied when the flag is unset on the zone itself.
    ///
    /// Safe zones default everything off. War zones default PvP on and
    /// world mutation off.
    pub const fn default_for(self, kind: ZoneKind) -> bool {
        match (kind, self) {
            (ZoneKind::War, Self::PvpEnabled) => true,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Protected actions
// ---------------------------------------------------------------------------

/// The kind of world-mutating action being attempted, as presented to the
/// protection resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    /// Placing or breaking blocks.
    Build,
    /// Using doors, levers, buttons, beds.
    Interact,
    /// Opening chests, furnaces, and other inventories.
    Container,
    /// Dealing damage to another player (the defender).
    Pvp(crate::ids::PlayerId),
}

impl ActionKind {
    /// The zone flag that governs this action inside a zone.
    pub const fn zone_flag(self) -> ZoneFlag {
        match self {
            Self::Build => ZoneFlag::Build,
            Self::Interact => ZoneFlag::Interact,
            Self::Container => ZoneFlag::Container,
            Self::Pvp(_) => ZoneFlag::PvpEnabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn war_zone_defaults_pvp_on() {
        assert!(ZoneFlag::PvpEnabled.default_for(ZoneKind::War));
        assert!(!ZoneFlag::Build.default_for(ZoneKind::War));
    }

    #[test]
    fn safe_zone_defaults_everything_off() {
        for flag in [
            ZoneFlag::Build,
            ZoneFlag::Interact,
            ZoneFlag::Container,
            ZoneFlag::PvpEnabled,
        ] {
            assert!(!flag.default_for(ZoneKind::Safe));
        }
    }

    #[test]
    fn roles_order_by_authority() {
        assert!(FactionRole::Owner.is_officer());
        assert!(FactionRole::Officer.is_officer());
        assert!(!FactionRole::Member.is_officer());
        assert!(FactionRole::Member < FactionRole::Officer);
    }
}
