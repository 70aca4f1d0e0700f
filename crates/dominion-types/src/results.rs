//! Closed result enums for every exposed operation.
//!
//! No operation in this engine signals an expected business condition
//! through `Err`: each returns one of these enums, and the (external)
//! command layer translates them into user-facing feedback. `Err` is
//! reserved for genuine faults (bad config, undecodable snapshots).

use serde::{Deserialize, Serialize};

use crate::ids::FactionId;

/// Outcome of a claim, unclaim, or overclaim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimResult {
    /// The ownership transition committed.
    Success,
    /// The actor is not in any faction.
    NotInFaction,
    /// The actor's role is below officer.
    NotOfficer,
    /// The chunk is already owned (claim), or the expected owner changed
    /// under a racing mutation (the loser's result).
    AlreadyOwned,
    /// The chunk is not owned by the actor's faction (unclaim), or not
    /// owned at all (overclaim against wilderness).
    NotOwned,
    /// The chunk lies inside a safe zone, which excludes claiming.
    Safezone,
    /// The chunk lies inside a war zone, which excludes claiming.
    Warzone,
    /// The chunk is not adjacent to any existing claim of the faction
    /// (and the faction already holds at least one claim).
    NotAdjacent,
    /// The faction lacks the power to hold another claim, or the
    /// overclaim power margin was not met.
    PowerTooLow,
    /// Overclaim attempted against a faction that is not an enemy.
    NotEnemy,
}

/// Outcome of a diplomatic transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationResult {
    /// The transition committed. For an ally request this means either a
    /// new pending request or (on reciprocation) the alliance itself.
    Success,
    /// An ally request was recorded and awaits reciprocation.
    RequestPending,
    /// A faction cannot relate to itself.
    SelfRelation,
    /// The pair is already allied.
    AlreadyAlly,
    /// The pair already holds the requested relation.
    AlreadySet,
    /// The requesting faction is at its ally cap.
    AllyLimitReached,
    /// The requesting faction is at its enemy cap.
    EnemyLimitReached,
    /// One of the named factions does not exist.
    UnknownFaction(FactionId),
}

/// Outcome of a teleport-to-home request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeleportResult {
    /// Warmup was zero; the executor ran synchronously.
    SuccessInstant,
    /// A pending teleport was stored; the executor fires after warmup.
    SuccessWarmup,
    /// The player is not in any faction.
    NotInFaction,
    /// The player's faction has no home set.
    NoHome,
    /// The player is combat tagged.
    CombatTagged,
    /// A cooldown from a previous teleport is still running.
    OnCooldown,
    /// A warmup for this player is already pending.
    AlreadyPending,
}

/// Outcome of a set-home request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HomeResult {
    /// The home was set.
    Success,
    /// The player is not in any faction.
    NotInFaction,
    /// The player's role is below officer.
    NotOfficer,
    /// The standing chunk is not owned by the player's faction.
    NotInOwnTerritory,
}

/// The verdict of the protection resolver for one attempted action.
///
/// Variants record *why* the action was allowed or denied, so callers can
/// produce precise feedback and tests can assert on precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Actor holds the administrative bypass capability.
    AllowedBypass,
    /// A zone flag explicitly allows the action.
    AllowedZone,
    /// A war zone with PvP enabled forces the damage through.
    AllowedWarzone,
    /// The chunk is unowned wilderness.
    AllowedWilderness,
    /// The chunk is owned by the actor's own faction.
    AllowedOwnClaim,
    /// The owning faction grants this action to allies.
    AllowedAllyClaim,
    /// Ordinary PvP between unrelated parties.
    Allowed,
    /// A zone flag explicitly denies the action.
    DeniedZone,
    /// A safe zone forces the denial regardless of relation.
    DeniedSafezone,
    /// The owning faction is an enemy of the actor's faction.
    DeniedEnemyClaim,
    /// The actor is not a member of the owning faction (neutral relation).
    DeniedNotMember,
    /// The owning faction does not grant this action to allies.
    DeniedNoPermission,
    /// Both parties share a faction or an alliance (friendly fire).
    DeniedFriendlyFire,
    /// The defender is under spawn protection.
    DeniedSpawnProtected,
}

impl Verdict {
    /// Whether this verdict permits the action.
    pub const fn allowed(self) -> bool {
        matches!(
            self,
            Self::AllowedBypass
                | Self::AllowedZone
                | Self::AllowedWarzone
                | Self::AllowedWilderness
                | Self::AllowedOwnClaim
                | Self::AllowedAllyClaim
                | Self::Allowed
        )
    }
}
