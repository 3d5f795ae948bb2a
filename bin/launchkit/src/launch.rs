//! ---
//! lk_section: "05-launcher-cli"
//! lk_subsection: "binary"
//! lk_type: "source"
//! lk_scope: "code"
//! lk_description: "Spawning the installed application as a child process."
//! lk_version: "v0.1.0-alpha"
//! lk_owner: "tbd"
//! ---
use std::path::Path;
use std::process::{Child, Command};

use anyhow::{Context, Result};
use launchkit_core::{AppDescriptor, LauncherConfig};
use tracing::{debug, info};

/// Launch the installed application if a launchable artifact exists on disk.
///
/// Returns `Ok(None)` when there is nothing to launch yet (no local
/// descriptor, or the launch path does not exist) — the launcher's first-run
/// signal. The updater's responsibility ends at producing a valid launch
/// path; from here on the application is an independent child process.
pub fn launch_if_installed(config: &LauncherConfig) -> Result<Option<Child>> {
    let Ok(descriptor) = AppDescriptor::load(&config.paths.descriptor) else {
        debug!("no local application descriptor yet");
        return Ok(None);
    };
    let path = config.launch_path(&descriptor.launch_path);
    if !path.exists() {
        debug!(path = %path.display(), "launch path not present on disk");
        return Ok(None);
    }
    let child = launch_app(&path, config)?;
    info!(app = %descriptor.app_name, path = %path.display(), "application launched");
    Ok(Some(child))
}

/// Spawn the application at `path`, optionally through the configured
/// wrapper command, with the configured `key=value` extra arguments.
fn launch_app(path: &Path, config: &LauncherConfig) -> Result<Child> {
    let mut command = match config.launch.command.as_deref() {
        Some(wrapper) => {
            let mut cmd = Command::new(wrapper);
            cmd.arg(path);
            cmd
        }
        None => Command::new(path),
    };
    for (key, value) in &config.launch.extra_args {
        command.arg(format!("{key}={value}"));
    }
    command
        .spawn()
        .with_context(|| format!("failed to launch {}", path.display()))
}
