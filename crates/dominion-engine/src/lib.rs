//! Protection resolution, combat state, teleportation, and the server
//! context for the Dominion territory engine.
//!
//! This crate assembles the stores from `dominion-relations` and
//! `dominion-territory` behind one explicitly-wired [`ServerContext`] and
//! adds the engine-only concerns: the ordered protection verdict, the
//! combat tag and spawn protection state machine, and warmup/cooldown
//! home teleports.
//!
//! # Modules
//!
//! - [`clock`] -- [`Clock`] trait with system and manual implementations.
//! - [`scheduler`] -- Cancellable deferred tasks; tokio and manual backends.
//! - [`hooks`] -- Boundary traits the hosting environment implements
//!   (permissions, power, messages, persistence).
//! - [`config`] -- YAML configuration with serde defaults per field.
//! - [`combat`] -- Combat tagging and spawn protection.
//! - [`resolver`] -- The ordered protection verdict function.
//! - [`teleport`] -- Warmup/cooldown home teleport coordination.
//! - [`context`] -- [`ServerContext`], the facade wiring it all together.
//!
//! [`Clock`]: clock::Clock

pub mod clock;
pub mod combat;
pub mod config;
pub mod context;
pub mod hooks;
pub mod resolver;
pub mod scheduler;
pub mod teleport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use combat::CombatStateMachine;
pub use config::{ConfigError, DominionConfig};
pub use context::{ImportReport, ServerContext};
pub use hooks::{
    DenyAllPermissions, MessageSink, PermissionOracle, PersistenceError, PersistenceStore,
    PowerLedger, SilentMessageSink,
};
pub use resolver::ProtectionResolver;
pub use scheduler::{ManualScheduler, Scheduler, Task, TaskHandle, TokioScheduler};
pub use teleport::{TeleportCoordinator, TeleportExecutor};
