//! ---
//! lk_section: "04-update-orchestration"
//! lk_subsection: "module"
//! lk_type: "source"
//! lk_scope: "code"
//! lk_description: "Staging area holding downloads until they are promoted."
//! lk_version: "v0.1.0-alpha"
//! lk_owner: "tbd"
//! ---
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

/// Working directory holding newly downloaded files that are not yet visible
/// to the installed application.
///
/// The staging area is owned exclusively by the orchestrator for the
/// duration of a run. Promotion moves every staged file into the live
/// install tree (the commit); discarding removes the staged content and
/// leaves the live tree untouched (the rollback).
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    /// Wrap a staging directory. Nothing is created until
    /// [`StagingArea::ensure`].
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Staging root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the staging directory tree if it does not exist yet.
    pub fn ensure(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    /// Absolute staging path for a component-relative install path.
    #[must_use]
    pub fn entry_path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Whether any staged content is present (leftovers from an interrupted
    /// run, or downloads from the current one).
    #[must_use]
    pub fn is_populated(&self) -> bool {
        fs::read_dir(&self.root)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
    }

    /// Move every staged file into `install_root`, replacing existing files
    /// of the same relative path, and return the number of files promoted.
    /// Intermediate directories are created as needed; files already in the
    /// live tree that have no staged counterpart are left alone.
    pub fn promote(&self, install_root: &Path) -> io::Result<usize> {
        let mut promoted = 0usize;
        for entry in WalkDir::new(&self.root).min_depth(1) {
            let entry = entry.map_err(io::Error::other)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .map_err(io::Error::other)?;
            let dest = install_root.join(relative);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            move_replacing(entry.path(), &dest)?;
            debug!(file = %relative.display(), "staged file promoted");
            promoted += 1;
        }
        // Staged directories are empty now; clear them so the next run sees
        // a clean area.
        self.discard()?;
        Ok(promoted)
    }

    /// Remove all staged content. The live install location is not touched.
    pub fn discard(&self) -> io::Result<()> {
        if !self.root.exists() {
            return Ok(());
        }
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

/// Rename with a copy-and-delete fallback for cross-device moves.
fn move_replacing(source: &Path, dest: &Path) -> io::Result<()> {
    match fs::rename(source, dest) {
        Ok(()) => Ok(()),
        Err(err) => {
            warn!(
                source = %source.display(),
                dest = %dest.display(),
                error = %err,
                "rename failed, falling back to copy"
            );
            fs::copy(source, dest)?;
            fs::remove_file(source)
        }
    }
}
