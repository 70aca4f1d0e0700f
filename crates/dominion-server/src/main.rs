//! Standalone host for the Dominion territory engine.
//!
//! Wires a [`ServerContext`] with the system clock, the tokio scheduler,
//! and JSON file persistence, then runs the background ticks until
//! interrupted. State is loaded from `territory.json` at startup when the
//! file exists and saved back on shutdown.
//!
//! Configuration is read from the YAML file named by `DOMINION_CONFIG`
//! (default `dominion.yaml`); a missing file means defaults.

mod host;
mod store;

use std::path::PathBuf;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dominion_engine::clock::{Clock, SystemClock};
use dominion_engine::config::DominionConfig;
use dominion_engine::context::ServerContext;
use dominion_engine::hooks::{DenyAllPermissions, MessageSink, PermissionOracle, PowerLedger};
use dominion_engine::scheduler::{Scheduler, TokioScheduler};

use crate::host::{FixedPowerLedger, LogMessageSink};
use crate::store::JsonFileStore;

/// Entry point: load config, restore state, run until interrupted, save.
///
/// # Errors
///
/// Returns an error when configuration loading, state restoration, or the
/// final save fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("dominion-server starting");

    let config_path =
        PathBuf::from(std::env::var("DOMINION_CONFIG").unwrap_or_else(|_| "dominion.yaml".into()));
    let config = if config_path.is_file() {
        DominionConfig::from_file(&config_path)?
    } else {
        warn!(path = %config_path.display(), "No config file, using defaults");
        DominionConfig::default()
    };

    let context = ServerContext::new(
        config,
        Arc::new(SystemClock) as Arc<dyn Clock>,
        Arc::new(TokioScheduler) as Arc<dyn Scheduler>,
        Arc::new(DenyAllPermissions) as Arc<dyn PermissionOracle>,
        Arc::new(FixedPowerLedger::new(Decimal::TEN)) as Arc<dyn PowerLedger>,
        Arc::new(LogMessageSink) as Arc<dyn MessageSink>,
    );

    let store = JsonFileStore::new(PathBuf::from(
        std::env::var("DOMINION_STATE").unwrap_or_else(|_| "territory.json".into()),
    ));
    if store.exists() {
        let report = context.load_from(&store)?;
        info!(
            factions = report.factions,
            claims = report.claims,
            zones = report.zones,
            "State restored"
        );
    } else {
        info!("No saved state, starting empty");
    }

    context.start_background_ticks();
    info!("dominion-server running, Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down, saving state");
    context.save_to(&store)?;
    Ok(())
}
