//! ---
//! lk_section: "02-state-persistence"
//! lk_subsection: "module"
//! lk_type: "source"
//! lk_scope: "code"
//! lk_description: "Flat-file update state with atomic whole-file commit."
//! lk_version: "v0.1.0-alpha"
//! lk_owner: "tbd"
//! ---
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use launchkit_core::Version;
use tracing::debug;
use url::Url;

use crate::{Result, StoreError};

/// Marker partitioning a component name from its version in the state file.
/// Multi-character on purpose so it cannot collide with a name or version.
pub const SPLIT_MARKER: &str = "<-sp->";

/// In-memory image of the persisted updater state.
///
/// `installed` reflects the versions whose files actually landed in the
/// install location; the updater never advances an entry past a component
/// whose download or promotion failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateState {
    /// Canonical server descriptor URL from the last committed run, if any.
    pub server_descriptor_url: Option<Url>,
    /// Component name to last-successfully-installed version, in commit
    /// order.
    pub installed: IndexMap<String, Version>,
}

/// Store owning the durable state file. Mutations are in-memory only until
/// [`UpdateStateStore::commit`]; a run that never commits leaves the file
/// exactly as it was loaded.
#[derive(Debug)]
pub struct UpdateStateStore {
    path: PathBuf,
    state: UpdateState,
}

impl UpdateStateStore {
    /// Load persisted state. A missing backing file is not an error and
    /// yields an empty state; the file is created on the first commit.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            debug!(path = %path.display(), "no updater state file, starting empty");
            return Ok(Self {
                path,
                state: UpdateState::default(),
            });
        }
        let state = read_state_file(&path)?;
        debug!(
            path = %path.display(),
            components = state.installed.len(),
            "updater state loaded"
        );
        Ok(Self { path, state })
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current in-memory state.
    #[must_use]
    pub fn state(&self) -> &UpdateState {
        &self.state
    }

    /// Version last installed for `name`. Absent components report `0.0.0`
    /// ("never installed"), which keeps them eligible for an initial install.
    #[must_use]
    pub fn installed_version(&self, name: &str) -> Version {
        self.state
            .installed
            .get(name)
            .copied()
            .unwrap_or(Version::ZERO)
    }

    /// Record a freshly installed component version. In-memory only;
    /// durability is deferred to [`UpdateStateStore::commit`].
    pub fn record_installed(&mut self, name: impl Into<String>, version: Version) {
        self.state.installed.insert(name.into(), version);
    }

    /// Record the canonical server descriptor URL. In-memory only.
    pub fn set_server_descriptor_url(&mut self, url: Url) {
        self.state.server_descriptor_url = Some(url);
    }

    /// Last known server descriptor URL, if one was ever committed.
    #[must_use]
    pub fn server_descriptor_url(&self) -> Option<&Url> {
        self.state.server_descriptor_url.as_ref()
    }

    /// Atomically replace the persisted representation with the in-memory
    /// state. The new content is written to a sibling temporary file and
    /// renamed over the target, so a concurrent or subsequent reader never
    /// observes a half-written file.
    pub fn commit(&self) -> Result<()> {
        let tmp = temp_path(&self.path);
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            match &self.state.server_descriptor_url {
                Some(url) => writeln!(writer, "{url}")?,
                None => writeln!(writer)?,
            }
            for (name, version) in &self.state.installed {
                writeln!(writer, "{name}{SPLIT_MARKER}{version}")?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        debug!(
            path = %self.path.display(),
            components = self.state.installed.len(),
            "updater state committed"
        );
        Ok(())
    }
}

/// Sibling scratch file for the atomic commit. Appends `.tmp` to the full
/// file name rather than swapping an existing extension, so a state file
/// configured as `state.txt` never collides with an unrelated `state.tmp`.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(ToOwned::to_owned).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn read_state_file(path: &Path) -> Result<UpdateState> {
    let corrupt = |detail: String| StoreError::Corrupt {
        path: path.display().to_string(),
        detail,
    };

    let reader = BufReader::new(File::open(path)?);
    let mut lines = reader.lines();

    let server_descriptor_url = match lines.next() {
        None => None,
        Some(first) => {
            let first = first?;
            if first.trim().is_empty() {
                None
            } else {
                Some(
                    Url::parse(first.trim())
                        .map_err(|err| corrupt(format!("bad descriptor url: {err}")))?,
                )
            }
        }
    };

    let mut installed = IndexMap::new();
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut parts = line.splitn(2, SPLIT_MARKER);
        let name = parts.next().unwrap_or_default();
        let Some(version) = parts.next() else {
            return Err(corrupt(format!("line without `{SPLIT_MARKER}` marker")));
        };
        if name.is_empty() {
            return Err(corrupt("component entry with empty name".to_owned()));
        }
        installed.insert(name.to_owned(), Version::parse(version));
    }

    Ok(UpdateState {
        server_descriptor_url,
        installed,
    })
}
