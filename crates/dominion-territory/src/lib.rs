//! Territory state for the Dominion engine: chunk ownership and zones.
//!
//! # Modules
//!
//! - [`claims`] -- [`ChunkOwnershipRegistry`]: claim, unclaim, and
//!   overclaim as per-chunk atomic check-and-set transitions, gated by
//!   roles, zones, adjacency, and the power ledger.
//! - [`zones`] -- [`ZoneOverlayStore`]: the chunk-to-zone overlay with
//!   per-kind flag defaults, consumed by the protection resolver.
//!
//! [`ChunkOwnershipRegistry`]: claims::ChunkOwnershipRegistry
//! [`ZoneOverlayStore`]: zones::ZoneOverlayStore

pub mod claims;
pub mod zones;

// Re-export primary types at crate root.
pub use claims::{ChunkOwnershipRegistry, ClaimRules, PowerLedger};
pub use zones::{Zone, ZoneError, ZoneOverlayStore};
