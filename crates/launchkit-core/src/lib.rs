//! ---
//! lk_section: "01-core-model"
//! lk_subsection: "module"
//! lk_type: "source"
//! lk_scope: "code"
//! lk_description: "Version, descriptor and configuration model for LaunchKit."
//! lk_version: "v0.1.0-alpha"
//! lk_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Core crate exposing the launcher's value types: component versions, the
//! application descriptor model with its parse seam, and the launcher
//! configuration loaded by the binary.

/// Result alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, DescriptorError>;

/// Error type covering descriptor loading and parsing.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    /// Wrapper for IO errors encountered while reading descriptor files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for malformed descriptor documents.
    #[error("descriptor parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// Two components in one descriptor claimed the same name.
    #[error("duplicate component name `{0}` in application descriptor")]
    DuplicateComponent(String),
}

pub mod config;
pub mod descriptor;
pub mod version;

pub use config::LauncherConfig;
pub use descriptor::{parse_app_descriptor, AppDescriptor, ComponentDescriptor};
pub use version::Version;
