//! ---
//! lk_section: "05-launcher-cli"
//! lk_subsection: "binary"
//! lk_type: "source"
//! lk_scope: "code"
//! lk_description: "Launcher entrypoint: update on start, then launch the app."
//! lk_version: "v0.1.0-alpha"
//! lk_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use launchkit_core::LauncherConfig;
use launchkit_net::{default_fetcher, LogProgress};
use launchkit_persistence::UpdateStateStore;
use launchkit_updater::{UpdateOrchestrator, UpdateOutcome};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

mod launch;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Self-updating application launcher",
    long_about = None
)]
struct Cli {
    /// Path to the launcher configuration file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    // First run means there is nothing launchable yet: either no descriptor
    // was ever fetched or the launch path is missing on disk. Computed once
    // here and passed down explicitly, never re-derived mid-run.
    let launched = launch::launch_if_installed(&config)?;
    let first_run = launched.is_none();

    let store = UpdateStateStore::load(&config.paths.state_file)
        .context("reading launcher cache; if this persists, delete the cache file")?;
    let fetcher =
        default_fetcher(config.connect_timeout()).context("building download client")?;
    let mut orchestrator = UpdateOrchestrator::new(config.clone(), store, fetcher);
    if first_run {
        // The download display is only shown while the user has nothing to
        // look at yet, i.e. before the very first launch.
        orchestrator = orchestrator.with_progress(Box::new(LogProgress));
    }

    match orchestrator.run_update(first_run)? {
        UpdateOutcome::Offline => {
            warn!("update server unreachable; starting the installed version");
        }
        UpdateOutcome::UpToDate => {
            info!("application is up to date");
        }
        UpdateOutcome::Updated { components } => {
            info!(components = %components.join(", "), "application updated");
        }
        UpdateOutcome::Failed { stage, reason } => {
            error!(stage = %stage, reason = %reason, "update failed; starting the installed version");
        }
    }

    if first_run {
        if launch::launch_if_installed(&config)?.is_none() {
            warn!("nothing to launch yet; the first update did not produce an installation");
        }
    }
    Ok(())
}

fn init_tracing() {
    let _ = Registry::default()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(fmt::layer())
        .try_init();
}

fn load_config(cli: &Cli) -> Result<LauncherConfig> {
    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("launchkit.toml"));
    candidates.push(PathBuf::from("configs/launchkit.toml"));
    LauncherConfig::load(&candidates)
}
