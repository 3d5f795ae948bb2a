//! ---
//! lk_section: "04-update-orchestration"
//! lk_subsection: "module"
//! lk_type: "source"
//! lk_scope: "code"
//! lk_description: "The update run state machine: probe, fetch, delta, commit."
//! lk_version: "v0.1.0-alpha"
//! lk_owner: "tbd"
//! ---
use std::fmt;
use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use launchkit_core::{
    parse_app_descriptor, AppDescriptor, ComponentDescriptor, LauncherConfig, Version,
};
use launchkit_net::{server_reachable, Fetcher, NoopProgress, ProgressSink};
use launchkit_persistence::UpdateStateStore;
use tracing::{debug, info, warn};
use url::Url;

use crate::staging::StagingArea;
use crate::Result;

/// Name under which the freshly fetched descriptor sits in the staging area
/// until it has parsed successfully.
const STAGED_DESCRIPTOR: &str = "descriptor.staged.json";

/// Pipeline stages of one update run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStage {
    /// Reachability probe against the update server host.
    CheckingConnectivity,
    /// Downloading and parsing the server's application descriptor.
    FetchingDescriptor,
    /// Selecting components strictly newer than the installed versions.
    ComputingDelta,
    /// Downloading selected components into the staging area.
    InstallingComponents,
    /// Promoting staged files and persisting the new state.
    Committing,
}

impl fmt::Display for UpdateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UpdateStage::CheckingConnectivity => "checking-connectivity",
            UpdateStage::FetchingDescriptor => "fetching-descriptor",
            UpdateStage::ComputingDelta => "computing-delta",
            UpdateStage::InstallingComponents => "installing-components",
            UpdateStage::Committing => "committing",
        };
        f.write_str(text)
    }
}

/// Outcome of one update run. Expected stage failures are values here, never
/// errors: the caller can always proceed to launch whatever is installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The server was unreachable; no update was attempted and nothing was
    /// touched.
    Offline,
    /// Every component was already current; state was re-committed with the
    /// fresh descriptor locator.
    UpToDate,
    /// The named components were downloaded, promoted and recorded.
    Updated {
        /// Components updated in this run, in descriptor order.
        components: Vec<String>,
    },
    /// A stage failed and the run was rolled back; the install location and
    /// persisted state are as they were before the run.
    Failed {
        /// Stage that failed.
        stage: UpdateStage,
        /// Human-readable failure description.
        reason: String,
    },
}

impl UpdateOutcome {
    /// Whether any component was actually updated in this run.
    #[must_use]
    pub fn updated_any(&self) -> bool {
        matches!(self, UpdateOutcome::Updated { .. })
    }
}

/// The update control loop.
///
/// Owns the persisted state store and the staging area for the duration of a
/// run; collaborators (byte fetcher, progress display) are injected. The
/// pipeline is a synchronous single pass: each stage completes before the
/// next starts, and a stage failure converts into a rolled-back
/// [`UpdateOutcome::Failed`] at this boundary rather than propagating.
pub struct UpdateOrchestrator {
    config: LauncherConfig,
    store: UpdateStateStore,
    fetcher: Box<dyn Fetcher>,
    progress: Box<dyn ProgressSink>,
}

impl UpdateOrchestrator {
    /// Build an orchestrator from configuration, a loaded state store and a
    /// fetcher. Progress notifications go nowhere until
    /// [`UpdateOrchestrator::with_progress`] installs a sink.
    pub fn new(
        config: LauncherConfig,
        store: UpdateStateStore,
        fetcher: Box<dyn Fetcher>,
    ) -> Self {
        Self {
            config,
            store,
            fetcher,
            progress: Box::new(NoopProgress),
        }
    }

    /// Install a progress sink receiving download notifications.
    #[must_use]
    pub fn with_progress(mut self, progress: Box<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Read access to the state store (the persisted view of what is
    /// installed).
    #[must_use]
    pub fn store(&self) -> &UpdateStateStore {
        &self.store
    }

    /// Path the application is launched from, derived from the last good
    /// local descriptor. `None` when no descriptor has ever been fetched,
    /// which is the launcher's first-run signal.
    #[must_use]
    pub fn launch_path(&self) -> Option<PathBuf> {
        let descriptor = AppDescriptor::load(&self.config.paths.descriptor).ok()?;
        Some(self.config.launch_path(&descriptor.launch_path))
    }

    /// Execute one update run.
    ///
    /// On `first_run`, staged files left over from a previous interrupted
    /// run are promoted before the new cycle begins; this recovers a run
    /// whose files were fully downloaded but whose consumer terminated
    /// before relaunching. In every other case leftovers are discarded.
    ///
    /// Stage failures come back as [`UpdateOutcome`] values; only fatal
    /// local I/O (directories that cannot be created, files that cannot be
    /// moved, a state file that cannot be written) is an `Err`.
    pub fn run_update(&mut self, first_run: bool) -> Result<UpdateOutcome> {
        let started = Utc::now();
        let staging = StagingArea::new(&self.config.paths.staging_dir);

        if staging.is_populated() {
            if first_run {
                self.recover_staged_leftovers(&staging)?;
            } else {
                debug!("discarding staging leftovers from a previous run");
                staging.discard()?;
            }
        }

        // CheckingConnectivity. Failure aborts with zero side effects.
        let server_url = self.server_descriptor_url();
        if !server_reachable(&server_url, self.config.connect_timeout()) {
            warn!(server = %server_url, "update server unreachable, skipping update");
            return Ok(UpdateOutcome::Offline);
        }

        staging.ensure()?;

        // FetchingDescriptor.
        let descriptor = match self.fetch_descriptor(&staging, &server_url) {
            Ok(descriptor) => descriptor,
            Err(reason) => {
                return self.roll_back(&staging, UpdateStage::FetchingDescriptor, reason)
            }
        };

        // ComputingDelta: strictly-newer components, in descriptor order.
        let pending: Vec<&ComponentDescriptor> = descriptor
            .components
            .iter()
            .filter(|c| c.version > self.store.installed_version(&c.name))
            .collect();
        info!(
            stage = %UpdateStage::ComputingDelta,
            total = descriptor.components.len(),
            out_of_date = pending.len(),
            "delta computed"
        );

        // InstallingComponents: stop at the first failure, staging only.
        let mut downloaded: Vec<(String, Version)> = Vec::new();
        for component in pending {
            let dest = staging.entry_path(&component.local_path);
            info!(
                stage = %UpdateStage::InstallingComponents,
                component = %component.name,
                version = %component.version,
                "downloading component"
            );
            match self
                .fetcher
                .fetch(&component.server_url, &dest, self.progress.as_ref())
            {
                Ok(bytes) => {
                    debug!(component = %component.name, bytes, "component staged");
                    downloaded.push((component.name.clone(), component.version));
                }
                Err(err) => {
                    let reason = format!("component `{}`: {err}", component.name);
                    return self.roll_back(&staging, UpdateStage::InstallingComponents, reason);
                }
            }
        }

        // Committing: promote staging, then persist the new state. I/O
        // failures from here on are fatal, not rolled back stage failures.
        let promoted = staging.promote(&self.config.paths.install_dir)?;
        for (name, version) in &downloaded {
            self.store.record_installed(name.clone(), *version);
        }
        self.store
            .set_server_descriptor_url(descriptor.server_descriptor_url.clone());
        self.store.commit()?;

        let components: Vec<String> = downloaded.into_iter().map(|(name, _)| name).collect();
        info!(
            stage = %UpdateStage::Committing,
            promoted,
            components = components.len(),
            elapsed_ms = (Utc::now() - started).num_milliseconds(),
            "update run committed"
        );
        if components.is_empty() {
            Ok(UpdateOutcome::UpToDate)
        } else {
            Ok(UpdateOutcome::Updated { components })
        }
    }

    /// The descriptor URL this run talks to: the last committed one, falling
    /// back to the configured well-known default.
    fn server_descriptor_url(&self) -> Url {
        self.store
            .server_descriptor_url()
            .cloned()
            .unwrap_or_else(|| self.config.server.default_descriptor_url.clone())
    }

    /// Promote files a previous run downloaded but never made visible. The
    /// one exception to discard-on-start: it makes the previous run's
    /// completed install durable without re-downloading anything.
    fn recover_staged_leftovers(&self, staging: &StagingArea) -> Result<()> {
        // A descriptor stuck mid-fetch is not an install artifact.
        let _ = fs::remove_file(staging.entry_path(STAGED_DESCRIPTOR));
        let promoted = staging.promote(&self.config.paths.install_dir)?;
        if promoted > 0 {
            info!(promoted, "recovered staged files from interrupted run");
        }
        Ok(())
    }

    /// Download the server descriptor into staging, parse it, and only then
    /// replace the local descriptor copy. Any error leaves the previous
    /// local descriptor untouched.
    fn fetch_descriptor(
        &mut self,
        staging: &StagingArea,
        server_url: &Url,
    ) -> std::result::Result<AppDescriptor, String> {
        let staged = staging.entry_path(STAGED_DESCRIPTOR);
        self.fetcher
            .fetch(server_url, &staged, self.progress.as_ref())
            .map_err(|err| format!("descriptor fetch: {err}"))?;
        let bytes = fs::read(&staged).map_err(|err| format!("descriptor read: {err}"))?;
        let descriptor =
            parse_app_descriptor(&bytes).map_err(|err| format!("descriptor parse: {err}"))?;
        if let Some(parent) = self.config.paths.descriptor.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| format!("descriptor store: {err}"))?;
            }
        }
        fs::rename(&staged, &self.config.paths.descriptor)
            .map_err(|err| format!("descriptor store: {err}"))?;
        debug!(
            app = %descriptor.app_name,
            components = descriptor.components.len(),
            "descriptor refreshed"
        );
        Ok(descriptor)
    }

    /// Discard staged changes and report the failed stage. The live install
    /// and the persisted state are exactly as they were before the run;
    /// in-memory store mutations only ever happen at commit, so nothing
    /// needs unwinding there.
    fn roll_back(
        &self,
        staging: &StagingArea,
        stage: UpdateStage,
        reason: String,
    ) -> Result<UpdateOutcome> {
        warn!(stage = %stage, reason = %reason, "update run failed, rolling back");
        staging.discard()?;
        Ok(UpdateOutcome::Failed { stage, reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_updated_outcome_reports_an_update() {
        assert!(!UpdateOutcome::Offline.updated_any());
        assert!(!UpdateOutcome::UpToDate.updated_any());
        assert!(!UpdateOutcome::Failed {
            stage: UpdateStage::FetchingDescriptor,
            reason: "x".to_owned()
        }
        .updated_any());
        assert!(UpdateOutcome::Updated {
            components: vec!["core".to_owned()]
        }
        .updated_any());
    }

    #[test]
    fn stage_labels_are_stable() {
        assert_eq!(
            UpdateStage::CheckingConnectivity.to_string(),
            "checking-connectivity"
        );
        assert_eq!(UpdateStage::Committing.to_string(), "committing");
    }
}
