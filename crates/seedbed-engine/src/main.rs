//! Simulation binary for the Seedbed agent substrate.
//!
//! Wires a [`Colony`] from configuration and plays a scripted run through
//! it so every engine can be watched in the logs.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `seedbed-config.yaml` (or the path given as
//!    the first argument), falling back to defaults
//! 2. Initialize structured logging (tracing)
//! 3. Build the colony with in-memory persistence
//! 4. Run the script and log the summary

mod demo;
mod error;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use seedbed_agents::InMemoryPersistence;
use seedbed_core::{Colony, LoggingConfig, SeedbedConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Config file read when no path is given.
const DEFAULT_CONFIG_PATH: &str = "seedbed-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration cannot be parsed or the scripted
/// run fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let (config, from_file) = load_config(&config_path)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!(
        config_path = %config_path.display(),
        from_file,
        history_capacity = config.router.history_capacity,
        max_adaptations = config.prompt_evolution.max_adaptations,
        max_invitees = config.alliance.max_invitees,
        "seedbed-sim starting"
    );

    // 3. Build the colony.
    let store = Arc::new(InMemoryPersistence::new());
    let colony = Colony::with_persistence(&config, &store);

    // 4. Run the script.
    let summary = demo::run(&colony).await?;
    info!(
        agents = summary.agents,
        events_routed = summary.events_routed,
        trait_ticks = summary.trait_ticks,
        adaptations = summary.adaptations,
        alliances_formed = summary.alliances_formed,
        "scripted run complete"
    );

    Ok(())
}

/// Load configuration, using defaults when the file does not exist.
///
/// Returns the config and whether it came from the file.
fn load_config(path: &Path) -> Result<(SeedbedConfig, bool), EngineError> {
    if path.exists() {
        Ok((SeedbedConfig::from_file(path)?, true))
    } else {
        let mut config = SeedbedConfig::default();
        config.logging.apply_env_overrides();
        Ok((config, false))
    }
}

/// Install the global tracing subscriber.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
