//! Diplomatic relations and the faction directory for the Dominion engine.
//!
//! # Modules
//!
//! - [`graph`] -- The undirected faction-pair relation graph with the
//!   ally request/accept workflow and per-faction relation caps.
//! - [`faction`] -- [`FactionCatalog`], the concurrent directory of
//!   factions (membership roles, home, ally permissions).
//!
//! [`FactionCatalog`]: faction::FactionCatalog

pub mod faction;
pub mod graph;

// Re-export primary types at crate root.
pub use faction::{CatalogError, FactionCatalog};
pub use graph::{FactionPair, RelationGraph, RelationLimits};
