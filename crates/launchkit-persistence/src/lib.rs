//! ---
//! lk_section: "02-state-persistence"
//! lk_subsection: "module"
//! lk_type: "source"
//! lk_scope: "code"
//! lk_description: "Durable updater state: installed versions and descriptor locator."
//! lk_version: "v0.1.0-alpha"
//! lk_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Persistence crate for the updater's durable state. The state survives
//! across launcher runs and is the sole record of which component versions
//! have actually landed in the install location.

/// Result alias used throughout the persistence crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Error type for the state store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Wrapper for IO errors encountered while reading/writing the state file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The state file exists but cannot be understood. The store never
    /// guesses or repairs; the user is told to remove the cache file.
    #[error(
        "launcher cache file {path} is corrupt ({detail}); delete it to reset update state"
    )]
    Corrupt {
        /// Path of the offending cache file.
        path: String,
        /// What the reader stumbled over.
        detail: String,
    },
}

pub mod state;

pub use state::{UpdateState, UpdateStateStore, SPLIT_MARKER};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_error_names_the_cache_file() {
        let err = StoreError::Corrupt {
            path: "updater_data".to_owned(),
            detail: "missing field marker".to_owned(),
        };
        let text = format!("{err}");
        assert!(text.contains("updater_data"));
        assert!(text.contains("delete it"));
    }
}
