//! The diplomatic relation graph.
//!
//! One edge per unordered faction pair, keyed by [`FactionPair`] so the
//! graph cannot hold duplicate or contradictory edges and `relation(A, B)`
//! is `relation(B, A)` by construction.
//!
//! # State machine (per pair)
//!
//! ```text
//! Neutral --request_ally(A)--> Pending(by A) --request_ally(B)--> Ally
//! Pending | Ally | Enemy --set_neutral--> Neutral
//! any non-Enemy --set_enemy--> Enemy        (no handshake required)
//! ```
//!
//! Hostility and de-escalation are unilateral; only the alliance needs the
//! reciprocal handshake. An ally request against an existing `Enemy` edge
//! is allowed and, once reciprocated, replaces the hostility.
//!
//! # Invariants
//!
//! - A faction cannot relate to itself.
//! - Transitions are atomic per pair: the edge is mutated under its shard
//!   guard, so no observer sees a half-applied edge.
//! - Ally and enemy counts per faction are capped; caps are checked under
//!   the count lock before the edge commits (lock order is always
//!   edge guard, then count lock).

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use dominion_types::{FactionId, RelationRecord, RelationResult, RelationType};

/// Canonicalized unordered pair of distinct faction ids.
///
/// The smaller id (by `Ord`) is always `first`, so `(A, B)` and `(B, A)`
/// produce the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FactionPair {
    first: FactionId,
    second: FactionId,
}

impl FactionPair {
    /// Canonicalize `(a, b)` into a pair key, or `None` if `a == b`.
    pub fn canonical(a: FactionId, b: FactionId) -> Option<Self> {
        match a.cmp(&b) {
            core::cmp::Ordering::Less => Some(Self { first: a, second: b }),
            core::cmp::Ordering::Greater => Some(Self { first: b, second: a }),
            core::cmp::Ordering::Equal => None,
        }
    }

    /// The lexically smaller faction of the pair.
    pub const fn first(self) -> FactionId {
        self.first
    }

    /// The lexically larger faction of the pair.
    pub const fn second(self) -> FactionId {
        self.second
    }

    /// Whether the pair touches `faction`.
    pub fn contains(self, faction: FactionId) -> bool {
        self.first == faction || self.second == faction
    }
}

/// The stored state of one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EdgeState {
    /// Relation currently in force.
    relation: RelationType,
    /// An unreciprocated ally request, if any.
    pending_by: Option<FactionId>,
}

impl EdgeState {
    /// Whether this edge carries no information and can be dropped.
    const fn is_default(self) -> bool {
        matches!(self.relation, RelationType::Neutral) && self.pending_by.is_none()
    }
}

/// Per-faction ally and enemy edge counts.
#[derive(Debug, Clone, Copy, Default)]
struct RelationCounts {
    allies: u32,
    enemies: u32,
}

/// Configured caps on relations per faction.
#[derive(Debug, Clone, Copy)]
pub struct RelationLimits {
    /// Maximum simultaneous allies per faction.
    pub max_allies: u32,
    /// Maximum simultaneous enemies per faction.
    pub max_enemies: u32,
}

impl Default for RelationLimits {
    fn default() -> Self {
        Self {
            max_allies: 10,
            max_enemies: 10,
        }
    }
}

/// The undirected faction-pair relation store.
#[derive(Debug)]
pub struct RelationGraph {
    /// Edge per canonical pair. Absent edge means neutral, no pending.
    edges: DashMap<FactionPair, EdgeState>,
    /// Per-faction ally/enemy tallies, guarded by one lock so cap checks
    /// and commits cannot interleave.
    counts: Mutex<BTreeMap<FactionId, RelationCounts>>,
    limits: RelationLimits,
}

impl RelationGraph {
    /// Create an empty graph with the given caps.
    pub fn new(limits: RelationLimits) -> Self {
        Self {
            edges: DashMap::new(),
            counts: Mutex::new(BTreeMap::new()),
            limits,
        }
    }

    /// The relation currently in force between `a` and `b`.
    ///
    /// A pending ally request does not change the relation; `a == b` is
    /// reported as [`RelationType::Neutral`] (a faction is not its own
    /// ally for relation purposes; membership handles that).
    pub fn relation_between(&self, a: FactionId, b: FactionId) -> RelationType {
        FactionPair::canonical(a, b)
            .and_then(|pair| self.edges.get(&pair).map(|edge| edge.relation))
            .unwrap_or(RelationType::Neutral)
    }

    /// The faction whose ally request on this pair awaits reciprocation.
    pub fn pending_request_by(&self, a: FactionId, b: FactionId) -> Option<FactionId> {
        FactionPair::canonical(a, b).and_then(|pair| self.edges.get(&pair).and_then(|e| e.pending_by))
    }

    /// Request an alliance from `requester` towards `target`.
    ///
    /// A first request marks the pair pending; a reciprocal request from
    /// the other side commits the alliance in the same transition.
    pub fn request_ally(&self, requester: FactionId, target: FactionId) -> RelationResult {
        let Some(pair) = FactionPair::canonical(requester, target) else {
            return RelationResult::SelfRelation;
        };

        let mut entry = self.edges.entry(pair).or_insert(EdgeState {
            relation: RelationType::Neutral,
            pending_by: None,
        });

        if entry.relation == RelationType::Ally {
            return RelationResult::AlreadyAlly;
        }

        match entry.pending_by {
            Some(by) if by == requester => RelationResult::AlreadySet,
            Some(_) => {
                // Reciprocal request: auto-accept, capped on both sides.
                let mut counts = self.lock_counts();
                let requester_allies = counts.get(&requester).copied().unwrap_or_default().allies;
                let target_allies = counts.get(&target).copied().unwrap_or_default().allies;
                if requester_allies >= self.limits.max_allies
                    || target_allies >= self.limits.max_allies
                {
                    return RelationResult::AllyLimitReached;
                }

                let previous = entry.relation;
                entry.relation = RelationType::Ally;
                entry.pending_by = None;
                Self::apply_count_delta(&mut counts, pair, previous, RelationType::Ally);
                drop(counts);
                debug!(%requester, %target, "Alliance formed");
                RelationResult::Success
            }
            None => {
                // First request. The cap is only checked here as a
                // courtesy; the binding check happens at acceptance.
                let counts = self.lock_counts();
                let requester_allies = counts.get(&requester).copied().unwrap_or_default().allies;
                drop(counts);
                if requester_allies >= self.limits.max_allies {
                    return RelationResult::AllyLimitReached;
                }
                entry.pending_by = Some(requester);
                debug!(%requester, %target, "Ally request pending");
                RelationResult::RequestPending
            }
        }
    }

    /// Declare `target` an enemy of `actor`. Unilateral.
    pub fn set_enemy(&self, actor: FactionId, target: FactionId) -> RelationResult {
        let Some(pair) = FactionPair::canonical(actor, target) else {
            return RelationResult::SelfRelation;
        };

        let mut entry = self.edges.entry(pair).or_insert(EdgeState {
            relation: RelationType::Neutral,
            pending_by: None,
        });

        if entry.relation == RelationType::Enemy {
            return RelationResult::AlreadySet;
        }

        let mut counts = self.lock_counts();
        let actor_enemies = counts.get(&actor).copied().unwrap_or_default().enemies;
        if actor_enemies >= self.limits.max_enemies {
            return RelationResult::EnemyLimitReached;
        }

        let previous = entry.relation;
        entry.relation = RelationType::Enemy;
        entry.pending_by = None;
        Self::apply_count_delta(&mut counts, pair, previous, RelationType::Enemy);
        drop(counts);
        debug!(%actor, %target, "Enemy declared");
        RelationResult::Success
    }

    /// Reset the pair to neutral, clearing any pending request. Unilateral.
    pub fn set_neutral(&self, actor: FactionId, target: FactionId) -> RelationResult {
        let Some(pair) = FactionPair::canonical(actor, target) else {
            return RelationResult::SelfRelation;
        };

        let Entry::Occupied(mut occupied) = self.edges.entry(pair) else {
            return RelationResult::AlreadySet;
        };

        let edge = *occupied.get();
        if edge.is_default() {
            occupied.remove();
            return RelationResult::AlreadySet;
        }

        let mut counts = self.lock_counts();
        Self::apply_count_delta(&mut counts, pair, edge.relation, RelationType::Neutral);
        drop(counts);
        // Neutral with no pending carries no information; drop the edge.
        occupied.remove();
        debug!(%actor, %target, "Relation reset to neutral");
        RelationResult::Success
    }

    /// Drop every edge touching `faction` and fix the tallies.
    ///
    /// Called when a faction is deleted; stale edges would otherwise pin
    /// count capacity on the surviving side.
    pub fn purge_faction(&self, faction: FactionId) {
        let touching: Vec<FactionPair> = self
            .edges
            .iter()
            .filter(|entry| entry.key().contains(faction))
            .map(|entry| *entry.key())
            .collect();

        for pair in touching {
            if let Some((_, edge)) = self.edges.remove(&pair) {
                let mut counts = self.lock_counts();
                Self::apply_count_delta(&mut counts, pair, edge.relation, RelationType::Neutral);
            }
        }
        let mut counts = self.lock_counts();
        counts.remove(&faction);
    }

    /// The number of allies `faction` currently holds.
    pub fn ally_count(&self, faction: FactionId) -> u32 {
        self.lock_counts().get(&faction).copied().unwrap_or_default().allies
    }

    /// The number of enemies `faction` currently holds.
    pub fn enemy_count(&self, faction: FactionId) -> u32 {
        self.lock_counts().get(&faction).copied().unwrap_or_default().enemies
    }

    /// Export all informative edges as persistence records.
    pub fn export(&self) -> Vec<RelationRecord> {
        self.edges
            .iter()
            .filter(|entry| !entry.value().is_default())
            .map(|entry| RelationRecord {
                faction_a: entry.key().first(),
                faction_b: entry.key().second(),
                relation: entry.value().relation,
                pending_request_by: entry.value().pending_by,
            })
            .collect()
    }

    /// Restore one persisted edge, replacing whatever the pair held.
    ///
    /// Returns `false` (and stores nothing) for a degenerate self-pair.
    pub fn restore(&self, record: &RelationRecord) -> bool {
        let Some(pair) = FactionPair::canonical(record.faction_a, record.faction_b) else {
            return false;
        };
        let state = EdgeState {
            relation: record.relation,
            pending_by: record.pending_request_by,
        };
        let previous = if state.is_default() {
            self.edges.remove(&pair).map(|(_, e)| e)
        } else {
            self.edges.insert(pair, state)
        };
        let mut counts = self.lock_counts();
        let from = previous.map_or(RelationType::Neutral, |e| e.relation);
        Self::apply_count_delta(&mut counts, pair, from, state.relation);
        true
    }

    /// Acquire the count lock, recovering from poisoning.
    ///
    /// Counts are plain tallies; a panic elsewhere cannot leave them in a
    /// state worse than a recount would fix.
    fn lock_counts(&self) -> std::sync::MutexGuard<'_, BTreeMap<FactionId, RelationCounts>> {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adjust both factions' tallies for a relation change on `pair`.
    fn apply_count_delta(
        counts: &mut BTreeMap<FactionId, RelationCounts>,
        pair: FactionPair,
        from: RelationType,
        to: RelationType,
    ) {
        if from == to {
            return;
        }
        for faction in [pair.first(), pair.second()] {
            let tally = counts.entry(faction).or_default();
            match from {
                RelationType::Ally => tally.allies = tally.allies.saturating_sub(1),
                RelationType::Enemy => tally.enemies = tally.enemies.saturating_sub(1),
                RelationType::Neutral => {}
            }
            match to {
                RelationType::Ally => tally.allies = tally.allies.saturating_add(1),
                RelationType::Enemy => tally.enemies = tally.enemies.saturating_add(1),
                RelationType::Neutral => {}
            }
        }
    }
}

impl Default for RelationGraph {
    fn default() -> Self {
        Self::new(RelationLimits::default())
    }
}
