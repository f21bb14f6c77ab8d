//! Thermal Sync Agent – finds cameras over mDNS, downloads their pending
//! recordings into the spool directory, deletes them from the camera, and
//! drives the status LED.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tracing::{info, warn};

use thermal_agent::client::HttpRecordingClient;
use thermal_agent::indicator::{ActivityState, Indicator, SysfsTrigger};
use thermal_agent::sync::Orchestrator;
use thermal_common::config::{self, Config};
use thermal_common::discovery::MdnsResolver;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── load config ──────────────────────────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| Config::default_path().to_string());
    let config = config::load(&PathBuf::from(&config_path)).context("Config load failed")?;

    info!(
        "Thermal Sync Agent starting (service={}, output={})",
        config.browse_type(),
        config.output_dir.display()
    );

    // The client retries the mkdir before every download.
    if let Err(e) = std::fs::create_dir_all(&config.output_dir) {
        warn!("Cannot create {}: {e}", config.output_dir.display());
    }

    let mut indicator = Indicator::new(SysfsTrigger::new(&config.led_trigger_file));
    indicator.set_state(ActivityState::Idle);

    // ── mDNS ─────────────────────────────────────────────────────────
    let resolver =
        MdnsResolver::new(config.browse_type()).context("Failed to initialize resolver")?;

    let client = HttpRecordingClient::from_config(&config)?;

    // ── ctrl-c ───────────────────────────────────────────────────────
    ctrlc::set_handler(move || {
        SHUTDOWN.store(true, Ordering::Relaxed);
        info!("Shutdown signal received, stopping after the current transfer");
    })
    .context("Cannot set Ctrl-C handler")?;

    // ── sync forever ─────────────────────────────────────────────────
    let mut orchestrator = Orchestrator::from_config(resolver, client, indicator, &config);
    let result = orchestrator.run(&SHUTDOWN);
    orchestrator.into_resolver().shutdown();
    result.context("Sync loop aborted")?;

    info!("Thermal Sync Agent stopped");
    Ok(())
}
