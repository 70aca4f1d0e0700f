//! Interfaces to the external collaborators this engine consumes.
//!
//! Each trait is the full boundary contract; the implementations live in
//! the hosting environment (permission plugin, currency ledger, chat,
//! save pipeline). The engine never formats user-facing text beyond the
//! short notices pushed through [`MessageSink`], and never decides when
//! persistence happens.

use dominion_types::{PlayerId, TerritorySnapshot};

pub use dominion_territory::PowerLedger;

/// Permission-node oracle (external permission storage).
pub trait PermissionOracle: Send + Sync {
    /// Whether the player holds the permission node.
    fn has_permission(&self, player: PlayerId, node: &str) -> bool;
}

/// One-way feedback channel to players. No return value is consumed.
pub trait MessageSink: Send + Sync {
    /// Deliver a human-readable notice to the player.
    fn send(&self, player: PlayerId, text: &str);
}

/// Faults reported by the external persistence backend.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// The backend failed to load or store the snapshot.
    #[error("persistence backend error: {0}")]
    Backend(String),
}

/// Bulk load/save of the engine's durable state. Format and timing are
/// owned by the hosting environment.
pub trait PersistenceStore: Send + Sync {
    /// Load the snapshot saved by the last [`save`](Self::save).
    fn load(&self) -> Result<TerritorySnapshot, PersistenceError>;

    /// Store the given snapshot.
    fn save(&self, snapshot: &TerritorySnapshot) -> Result<(), PersistenceError>;
}

/// An oracle that grants no permissions. Useful as a safe default and in
/// tests that exercise the non-bypass paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAllPermissions;

impl PermissionOracle for DenyAllPermissions {
    fn has_permission(&self, _player: PlayerId, _node: &str) -> bool {
        false
    }
}

/// A sink that discards all messages.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentMessageSink;

impl MessageSink for SilentMessageSink {
    fn send(&self, _player: PlayerId, _text: &str) {}
}
