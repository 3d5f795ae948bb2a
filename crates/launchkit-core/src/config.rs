//! ---
//! lk_section: "01-core-model"
//! lk_subsection: "module"
//! lk_type: "source"
//! lk_scope: "code"
//! lk_description: "Launcher configuration loading and validation."
//! lk_version: "v0.1.0-alpha"
//! lk_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

fn default_descriptor_path() -> PathBuf {
    PathBuf::from("descriptor.json")
}

fn default_install_dir() -> PathBuf {
    PathBuf::from("app")
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("update")
}

fn default_state_file() -> PathBuf {
    PathBuf::from("updater_data")
}

fn default_descriptor_url() -> Url {
    // Well-known location of the published descriptor, used until the first
    // fetched descriptor records its own canonical URL.
    Url::parse("https://raw.githubusercontent.com/launchkit-eng/releases/master/descriptor.json")
        .expect("valid built-in descriptor url")
}

fn default_connect_timeout_secs() -> u64 {
    3
}

/// Primary configuration object for the launcher binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// Filesystem layout of the managed installation.
    #[serde(default)]
    pub paths: PathsConfig,
    /// Update-server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// How the installed application is spawned.
    #[serde(default)]
    pub launch: LaunchConfig,
}

/// Filesystem layout of the managed installation. All paths are resolved
/// relative to the launcher's working directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Local copy of the last successfully fetched application descriptor.
    #[serde(default = "default_descriptor_path")]
    pub descriptor: PathBuf,
    /// Live install location read by the launched application.
    #[serde(default = "default_install_dir")]
    pub install_dir: PathBuf,
    /// Staging area holding downloads not yet promoted to the install.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
    /// Persisted updater state (cache) file.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

/// Update-server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Descriptor URL used when the persisted state has never recorded one.
    #[serde(default = "default_descriptor_url")]
    pub default_descriptor_url: Url,
    /// Reachability-probe and connect timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

/// How the installed application is spawned once it is current.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LaunchConfig {
    /// Optional interpreter or wrapper command (e.g. `java`). When absent the
    /// launch path itself is executed.
    #[serde(default)]
    pub command: Option<String>,
    /// Extra `key=value` arguments appended to the launch invocation.
    #[serde(default)]
    pub extra_args: Vec<(String, String)>,
}

impl LauncherConfig {
    /// Environment variable overriding the config file location.
    pub const ENV_CONFIG_PATH: &'static str = "LAUNCHKIT_CONFIG";

    /// Load configuration from disk, respecting the `LAUNCHKIT_CONFIG`
    /// override, falling back to the first existing candidate path, and
    /// finally to built-in defaults when no file exists at all.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                return Self::from_path(PathBuf::from(env_path));
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                return Self::from_path(candidate.as_ref().to_path_buf());
            }
        }

        debug!("no configuration file found, using built-in defaults");
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<LauncherConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Connect timeout as a [`Duration`].
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.server.connect_timeout_secs)
    }

    /// Absolute-or-relative path the application is launched from, derived
    /// from the install root and a descriptor-relative launch path.
    #[must_use]
    pub fn launch_path(&self, descriptor_launch_path: &str) -> PathBuf {
        self.paths.install_dir.join(descriptor_launch_path)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.paths.install_dir == self.paths.staging_dir {
            return Err(anyhow!(
                "install_dir and staging_dir must differ (both are {})",
                self.paths.install_dir.display()
            ));
        }
        if self.paths.install_dir.as_os_str().is_empty()
            || self.paths.staging_dir.as_os_str().is_empty()
        {
            return Err(anyhow!("install_dir and staging_dir must be non-empty"));
        }
        if self.server.connect_timeout_secs == 0 {
            return Err(anyhow!("connect_timeout_secs must be at least 1"));
        }
        Ok(())
    }
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            server: ServerConfig::default(),
            launch: LaunchConfig::default(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            descriptor: default_descriptor_path(),
            install_dir: default_install_dir(),
            staging_dir: default_staging_dir(),
            state_file: default_state_file(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            default_descriptor_url: default_descriptor_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = LauncherConfig::default();
        config.validate().unwrap();
        assert_eq!(config.paths.install_dir, PathBuf::from("app"));
        assert_eq!(config.connect_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let doc = r#"
            [paths]
            install_dir = "opt/workbench"

            [launch]
            command = "java"
            extra_args = [["profile", "production"]]
        "#;
        let config: LauncherConfig = toml::from_str(doc).unwrap();
        config.validate().unwrap();
        assert_eq!(config.paths.install_dir, PathBuf::from("opt/workbench"));
        assert_eq!(config.paths.staging_dir, PathBuf::from("update"));
        assert_eq!(config.launch.command.as_deref(), Some("java"));
        assert_eq!(
            config.launch.extra_args,
            vec![("profile".to_owned(), "production".to_owned())]
        );
    }

    #[test]
    fn rejects_shared_install_and_staging_dir() {
        let mut config = LauncherConfig::default();
        config.paths.staging_dir = config.paths.install_dir.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn launch_path_joins_install_root() {
        let config = LauncherConfig::default();
        assert_eq!(
            config.launch_path("workbench.jar"),
            PathBuf::from("app/workbench.jar")
        );
    }
}
