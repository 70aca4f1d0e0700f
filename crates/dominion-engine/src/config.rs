//! Configuration loading and typed config structures for the engine.
//!
//! The canonical configuration is a YAML file; this module defines
//! strongly-typed structs mirroring it, with a serde default for every
//! field so a partial (or empty) file yields a working configuration.
//! Open-question parameters from the design -- the overclaim power
//! margin, relation caps, tag and warmup durations -- live here rather
//! than as hardcoded constants.

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The parsed configuration is semantically invalid.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DominionConfig {
    /// Diplomatic relation caps.
    #[serde(default)]
    pub relations: RelationsConfig,

    /// Claim and overclaim parameters.
    #[serde(default)]
    pub territory: TerritoryConfig,

    /// Combat tag and spawn protection timing.
    #[serde(default)]
    pub combat: CombatConfig,

    /// Teleport warmup and cooldown timing.
    #[serde(default)]
    pub teleport: TeleportConfig,

    /// Permission node names.
    #[serde(default)]
    pub permissions: PermissionsConfig,

    /// Background tick cadences.
    #[serde(default)]
    pub ticks: TickConfig,
}

impl DominionConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, [`ConfigError::Yaml`]
    /// if the content is not valid YAML, [`ConfigError::Invalid`] if the
    /// values are out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Yaml`] or [`ConfigError::Invalid`].
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] with the failing constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.territory.power_per_claim <= Decimal::ZERO {
            return Err(ConfigError::Invalid {
                reason: "territory.power_per_claim must be positive".to_owned(),
            });
        }
        if self.territory.overclaim_power_margin < Decimal::ZERO {
            return Err(ConfigError::Invalid {
                reason: "territory.overclaim_power_margin must not be negative".to_owned(),
            });
        }
        if self.combat.tag_duration_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "combat.tag_duration_ms must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

/// Diplomatic relation caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RelationsConfig {
    /// Maximum simultaneous allies per faction.
    #[serde(default = "default_max_allies")]
    pub max_allies: u32,

    /// Maximum simultaneous enemies per faction.
    #[serde(default = "default_max_enemies")]
    pub max_enemies: u32,
}

impl Default for RelationsConfig {
    fn default() -> Self {
        Self {
            max_allies: default_max_allies(),
            max_enemies: default_max_enemies(),
        }
    }
}

/// Claim and overclaim parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TerritoryConfig {
    /// Power required to hold one claim.
    #[serde(default = "default_power_per_claim")]
    pub power_per_claim: Decimal,

    /// Margin by which an attacker's power must exceed the defender's.
    #[serde(default = "default_overclaim_margin")]
    pub overclaim_power_margin: Decimal,

    /// Whether claims beyond the first must border an existing claim.
    #[serde(default = "default_true")]
    pub require_adjacency: bool,
}

impl Default for TerritoryConfig {
    fn default() -> Self {
        Self {
            power_per_claim: default_power_per_claim(),
            overclaim_power_margin: default_overclaim_margin(),
            require_adjacency: true,
        }
    }
}

/// Combat tag and spawn protection timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CombatConfig {
    /// How long a PvP participant stays tagged, in milliseconds.
    #[serde(default = "default_tag_duration_ms")]
    pub tag_duration_ms: u64,

    /// Spawn protection duration after respawn, in milliseconds.
    /// Zero disables spawn protection.
    #[serde(default = "default_spawn_protection_ms")]
    pub spawn_protection_ms: u64,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            tag_duration_ms: default_tag_duration_ms(),
            spawn_protection_ms: default_spawn_protection_ms(),
        }
    }
}

/// Teleport warmup and cooldown timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TeleportConfig {
    /// Countdown before a home teleport executes, in milliseconds.
    /// Zero makes teleports instant.
    #[serde(default = "default_warmup_ms")]
    pub warmup_ms: u64,

    /// Rate limit after a successful teleport, in milliseconds.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

impl Default for TeleportConfig {
    fn default() -> Self {
        Self {
            warmup_ms: default_warmup_ms(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

/// Permission node names consulted through the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PermissionsConfig {
    /// Node granting the administrative bypass.
    #[serde(default = "default_bypass_node")]
    pub bypass_node: String,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            bypass_node: default_bypass_node(),
        }
    }
}

/// Background tick cadences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TickConfig {
    /// Combat decay tick interval, in milliseconds.
    #[serde(default = "default_decay_tick_ms")]
    pub combat_decay_ms: u64,

    /// Maintenance tick interval (cooldown pruning, stale-state sweep),
    /// in milliseconds.
    #[serde(default = "default_maintenance_tick_ms")]
    pub maintenance_ms: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            combat_decay_ms: default_decay_tick_ms(),
            maintenance_ms: default_maintenance_tick_ms(),
        }
    }
}

const fn default_max_allies() -> u32 {
    10
}

const fn default_max_enemies() -> u32 {
    10
}

const fn default_power_per_claim() -> Decimal {
    Decimal::TWO
}

const fn default_overclaim_margin() -> Decimal {
    Decimal::ONE
}

const fn default_true() -> bool {
    true
}

const fn default_tag_duration_ms() -> u64 {
    15_000
}

const fn default_spawn_protection_ms() -> u64 {
    10_000
}

const fn default_warmup_ms() -> u64 {
    5_000
}

const fn default_cooldown_ms() -> u64 {
    60_000
}

fn default_bypass_node() -> String {
    "dominion.bypass".to_owned()
}

const fn default_decay_tick_ms() -> u64 {
    1_000
}

const fn default_maintenance_tick_ms() -> u64 {
    60_000
}
