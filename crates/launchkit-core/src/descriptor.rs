//! ---
//! lk_section: "01-core-model"
//! lk_subsection: "module"
//! lk_type: "source"
//! lk_scope: "code"
//! lk_description: "Application and component descriptor model with parse seam."
//! lk_version: "v0.1.0-alpha"
//! lk_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::version::Version;
use crate::{DescriptorError, Result};

/// One distributable unit of the application as published by the update
/// server. Identity is `name`; two descriptors with the same name from
/// different fetches are the same logical component at different points in
/// time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    /// Unique component identifier within one application descriptor.
    pub name: String,
    /// Absolute URL the component payload is fetched from.
    pub server_url: Url,
    /// Relative path of the component file under the install root.
    pub local_path: String,
    /// Version published for this component.
    pub version: Version,
}

/// The server-published application descriptor. Produced fresh on every
/// successful fetch and superseded wholesale, never merged field by field
/// with a prior instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppDescriptor {
    /// Display name of the application.
    pub app_name: String,
    /// Relative path of the launchable artifact under the install root.
    pub launch_path: String,
    /// Canonical URL of this descriptor on the update server.
    pub server_descriptor_url: Url,
    /// Components in server-published order; this order drives download
    /// order during an update run.
    #[serde(default)]
    pub components: Vec<ComponentDescriptor>,
}

impl AppDescriptor {
    /// Read and parse a descriptor from a local file.
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading application descriptor");
        let bytes = fs::read(path)?;
        parse_app_descriptor(&bytes)
    }

    /// Look up a component by name.
    #[must_use]
    pub fn component(&self, name: &str) -> Option<&ComponentDescriptor> {
        self.components.iter().find(|c| c.name == name)
    }
}

/// Parse an application descriptor document.
///
/// This is the single seam between the wire format and the rest of the
/// launcher: callers only ever see the structured [`AppDescriptor`], so the
/// document encoding is an implementation detail of this function. Component
/// name uniqueness is enforced here, before any descriptor reaches the
/// update pipeline.
pub fn parse_app_descriptor(bytes: &[u8]) -> Result<AppDescriptor> {
    let descriptor: AppDescriptor = serde_json::from_slice(bytes)?;
    let mut seen = HashSet::new();
    for component in &descriptor.components {
        if !seen.insert(component.name.as_str()) {
            return Err(DescriptorError::DuplicateComponent(
                component.name.clone(),
            ));
        }
    }
    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> String {
        r#"{
            "app_name": "Workbench",
            "launch_path": "workbench.jar",
            "server_descriptor_url": "https://updates.example.com/workbench.json",
            "components": [
                {
                    "name": "core",
                    "server_url": "https://updates.example.com/core.jar",
                    "local_path": "core.jar",
                    "version": "1.2.0"
                },
                {
                    "name": "plugins",
                    "server_url": "https://updates.example.com/plugins.jar",
                    "local_path": "lib/plugins.jar",
                    "version": "0.9.3"
                }
            ]
        }"#
        .to_owned()
    }

    #[test]
    fn parses_components_in_document_order() {
        let descriptor = parse_app_descriptor(sample_json().as_bytes()).unwrap();
        assert_eq!(descriptor.app_name, "Workbench");
        let names: Vec<_> = descriptor.components.iter().map(|c| &c.name).collect();
        assert_eq!(names, ["core", "plugins"]);
        assert_eq!(
            descriptor.component("core").unwrap().version,
            Version::new(1, 2, 0)
        );
    }

    #[test]
    fn missing_components_list_is_empty() {
        let doc = r#"{
            "app_name": "Workbench",
            "launch_path": "workbench.jar",
            "server_descriptor_url": "https://updates.example.com/workbench.json"
        }"#;
        let descriptor = parse_app_descriptor(doc.as_bytes()).unwrap();
        assert!(descriptor.components.is_empty());
    }

    #[test]
    fn duplicate_component_names_are_rejected() {
        let doc = sample_json().replace("plugins", "core");
        let err = parse_app_descriptor(doc.as_bytes()).unwrap_err();
        assert!(matches!(err, DescriptorError::DuplicateComponent(name) if name == "core"));
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        assert!(matches!(
            parse_app_descriptor(b"not a descriptor"),
            Err(DescriptorError::Parse(_))
        ));
    }

    #[test]
    fn load_reports_missing_file_as_io() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppDescriptor::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, DescriptorError::Io(_)));
    }
}
