//! Combat tagging and spawn protection.
//!
//! Per-player state machine with three states: untagged (absent from the
//! map), `Tagged(expiry)`, and `SpawnProtected(expiry, anchor)`.
//!
//! A PvP damage event tags both participants; re-tagging extends the
//! expiry and never shortens it. Spawn protection is single-shot: it is
//! consumed the first time the player leaves the anchor chunk or commits
//! a hostile act, or lapses on natural expiry, whichever comes first.
//! Reads are lazy about expiry (an expired entry reads as absent); the
//! periodic decay tick physically removes lapsed entries.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tracing::{debug, info};

use dominion_types::{ChunkKey, PlayerId, Timestamp};

use crate::clock::Clock;
use crate::config::CombatConfig;

/// The stored per-player combat state.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CombatState {
    /// Recently engaged in PvP; restricted until `expires`.
    Tagged {
        /// When the tag lapses.
        expires: Timestamp,
    },
    /// Grace period after respawn, anchored to the respawn chunk.
    SpawnProtected {
        /// When the protection lapses.
        expires: Timestamp,
        /// The respawn chunk; leaving it consumes the protection.
        anchor: ChunkKey,
    },
}

/// The concurrent combat state machine.
pub struct CombatStateMachine {
    states: DashMap<PlayerId, CombatState>,
    clock: Arc<dyn Clock>,
    config: CombatConfig,
}

impl core::fmt::Debug for CombatStateMachine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CombatStateMachine")
            .field("tracked", &self.states.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CombatStateMachine {
    /// Create an empty state machine.
    pub fn new(config: CombatConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            states: DashMap::new(),
            clock,
            config,
        }
    }

    /// Record a PvP damage event: both participants become tagged.
    ///
    /// Existing tags are extended, never shortened. The attacker's spawn
    /// protection, if any, is consumed by the hostile act; the defender's
    /// is replaced too, since being tagged supersedes the grace period.
    pub fn tag(&self, attacker: PlayerId, defender: PlayerId) {
        let expires = self
            .clock
            .now()
            .saturating_add_millis(self.config.tag_duration_ms);
        self.apply_tag(attacker, expires);
        if defender != attacker {
            self.apply_tag(defender, expires);
        }
        debug!(%attacker, %defender, %expires, "Combat tag applied");
    }

    /// Whether the player is currently combat tagged.
    pub fn is_tagged(&self, player: PlayerId) -> bool {
        self.states.get(&player).is_some_and(|state| match *state {
            CombatState::Tagged { expires } => expires.is_after(self.clock.now()),
            CombatState::SpawnProtected { .. } => false,
        })
    }

    /// Whether the player is currently spawn protected.
    pub fn is_spawn_protected(&self, player: PlayerId) -> bool {
        self.states.get(&player).is_some_and(|state| match *state {
            CombatState::SpawnProtected { expires, .. } => expires.is_after(self.clock.now()),
            CombatState::Tagged { .. } => false,
        })
    }

    /// Milliseconds until the player's tag lapses, if tagged.
    pub fn tag_remaining_ms(&self, player: PlayerId) -> Option<u64> {
        let now = self.clock.now();
        self.states.get(&player).and_then(|state| match *state {
            CombatState::Tagged { expires } if expires.is_after(now) => {
                Some(now.millis_until(expires))
            }
            _ => None,
        })
    }

    /// Handle a disconnect. Returns `true` when the player logged out
    /// while combat tagged, for external penalty application; the state
    /// is cleared either way.
    pub fn on_disconnect(&self, player: PlayerId) -> bool {
        let was_tagged = self.is_tagged(player);
        self.states.remove(&player);
        if was_tagged {
            info!(%player, "Combat logout");
        }
        was_tagged
    }

    /// Handle a respawn: any tag is cleared, and if spawn protection is
    /// configured the player enters the protected state anchored to the
    /// respawn chunk.
    pub fn on_respawn(&self, player: PlayerId, anchor: ChunkKey) {
        if self.config.spawn_protection_ms == 0 {
            self.states.remove(&player);
            return;
        }
        let expires = self
            .clock
            .now()
            .saturating_add_millis(self.config.spawn_protection_ms);
        self.states
            .insert(player, CombatState::SpawnProtected { expires, anchor });
        debug!(%player, %expires, "Spawn protection granted");
    }

    /// Handle movement into `chunk`. Spawn protection is consumed the
    /// first time the player's chunk differs from the anchor.
    pub fn on_move(&self, player: PlayerId, chunk: &ChunkKey) {
        let moved_off_anchor = self
            .states
            .get(&player)
            .is_some_and(|state| match &*state {
                CombatState::SpawnProtected { anchor, .. } => anchor != chunk,
                CombatState::Tagged { .. } => false,
            });
        if moved_off_anchor {
            self.consume_spawn_protection(player);
        }
    }

    /// Remove the player's spawn protection, if present. Tags are kept.
    pub fn consume_spawn_protection(&self, player: PlayerId) {
        let removed = self
            .states
            .remove_if(&player, |_, state| {
                matches!(state, CombatState::SpawnProtected { .. })
            })
            .is_some();
        if removed {
            debug!(%player, "Spawn protection consumed");
        }
    }

    /// Remove every state whose expiry has passed. Returns how many
    /// entries lapsed.
    pub fn decay_tick(&self) -> usize {
        let now = self.clock.now();
        let before = self.states.len();
        self.states.retain(|_, state| {
            let expires = match state {
                CombatState::Tagged { expires } | CombatState::SpawnProtected { expires, .. } => {
                    *expires
                }
            };
            expires.is_after(now)
        });
        before.saturating_sub(self.states.len())
    }

    /// Number of players currently holding any combat state.
    pub fn tracked(&self) -> usize {
        self.states.len()
    }

    /// Tag one player, extending an existing tag and consuming spawn
    /// protection.
    fn apply_tag(&self, player: PlayerId, expires: Timestamp) {
        match self.states.entry(player) {
            Entry::Occupied(mut occupied) => {
                let extended = match *occupied.get() {
                    // Never shorten an existing tag.
                    CombatState::Tagged { expires: current } if current > expires => current,
                    _ => expires,
                };
                occupied.insert(CombatState::Tagged { expires: extended });
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CombatState::Tagged { expires });
            }
        }
    }
}
