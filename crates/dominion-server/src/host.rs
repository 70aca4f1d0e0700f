//! Host-side boundary implementations for standalone runs.
//!
//! A real deployment supplies its own permission plugin, currency ledger,
//! and chat channel. The standalone binary runs with these minimal stand-ins
//! so the engine can be exercised end to end.

use rust_decimal::Decimal;
use tracing::info;

use dominion_engine::hooks::{MessageSink, PowerLedger};
use dominion_types::{FactionId, PlayerId};

/// Grants every faction the same fixed power.
#[derive(Debug, Clone, Copy)]
pub struct FixedPowerLedger {
    power: Decimal,
}

impl FixedPowerLedger {
    /// Create a ledger reporting `power` for every faction.
    pub const fn new(power: Decimal) -> Self {
        Self { power }
    }
}

impl PowerLedger for FixedPowerLedger {
    fn faction_power(&self, _faction: FactionId) -> Decimal {
        self.power
    }
}

/// Writes player notices to the log instead of a chat channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMessageSink;

impl MessageSink for LogMessageSink {
    fn send(&self, player: PlayerId, text: &str) {
        info!(%player, text, "player notice");
    }
}
