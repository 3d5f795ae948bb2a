//! ---
//! lk_section: "04-update-orchestration"
//! lk_subsection: "module"
//! lk_type: "source"
//! lk_scope: "code"
//! lk_description: "Update orchestration: delta, staging, atomic commit, rollback."
//! lk_version: "v0.1.0-alpha"
//! lk_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Update orchestration crate. One [`orchestrator::UpdateOrchestrator`] run
//! takes the installation from its persisted state to the server-published
//! descriptor, all-or-nothing: either every out-of-date component lands and
//! the state commits, or the install location is left exactly as it was.

/// Result alias for fatal updater errors. Expected stage failures are
/// [`orchestrator::UpdateOutcome`] values, not errors; only unrecoverable
/// local I/O surfaces here.
pub type Result<T> = std::result::Result<T, UpdaterError>;

/// Fatal error type for the updater.
#[derive(Debug, thiserror::Error)]
pub enum UpdaterError {
    /// Local filesystem failure (cannot create directories, cannot move
    /// staged files). The current run cannot continue.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The persisted state could not be read or written.
    #[error(transparent)]
    Store(#[from] launchkit_persistence::StoreError),
}

pub mod orchestrator;
pub mod staging;

pub use orchestrator::{UpdateOrchestrator, UpdateOutcome, UpdateStage};
pub use staging::StagingArea;
