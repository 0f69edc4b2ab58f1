//! Plugin manifest loading and validation

use crate::error::{HostError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Manifest file name expected in every plugin directory
pub const MANIFEST_FILE: &str = "plugin.json";

/// Declarative descriptor identifying a plugin and its capability claims
///
/// Unknown fields are ignored; optional fields take their documented
/// defaults. `id` and `entry` are required and must be non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Globally unique, stable plugin id
    pub id: String,

    /// Human-readable plugin name
    #[serde(default)]
    pub name: String,

    /// Free-form version string
    #[serde(default = "default_version")]
    pub version: String,

    /// Plugin author
    #[serde(default)]
    pub author: Option<String>,

    /// Path of the loadable entry artifact, relative to the plugin directory
    pub entry: String,

    /// Capability names this plugin claims
    #[serde(default)]
    pub capabilities: Capabilities,
}

/// Capability claims declared by a manifest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// Communication protocol names (order-irrelevant set)
    #[serde(default)]
    pub protocols: Vec<String>,

    /// Task names (order-irrelevant set)
    #[serde(default)]
    pub tasks: Vec<String>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl PluginManifest {
    /// Read and parse the manifest file of a plugin directory
    ///
    /// Fails with [`HostError::ManifestMissing`] if no manifest file exists
    /// and [`HostError::ManifestInvalid`] if the content does not parse into
    /// a valid manifest. Has no side effects beyond reading the file.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Err(HostError::ManifestMissing(dir.to_path_buf()));
        }

        let content = fs::read_to_string(&path)?;
        let manifest: PluginManifest =
            serde_json::from_str(&content).map_err(HostError::manifest_invalid)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check the required-and-non-empty invariants
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(HostError::manifest_invalid("`id` must not be empty"));
        }
        if self.entry.trim().is_empty() {
            return Err(HostError::manifest_invalid("`entry` must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_manifest(dir: &Path, content: &str) {
        fs::write(dir.join(MANIFEST_FILE), content).unwrap();
    }

    #[test]
    fn test_load_full_manifest() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(
            dir.path(),
            r#"{
                "id": "scope-01",
                "name": "Oscilloscope Driver",
                "version": "2.1.0",
                "author": "Acme",
                "entry": "libscope.so",
                "capabilities": { "protocols": ["scpi"], "tasks": ["capture"] }
            }"#,
        );

        let manifest = PluginManifest::load(dir.path()).unwrap();
        assert_eq!(manifest.id, "scope-01");
        assert_eq!(manifest.version, "2.1.0");
        assert_eq!(manifest.author.as_deref(), Some("Acme"));
        assert_eq!(manifest.capabilities.protocols, vec!["scpi"]);
        assert_eq!(manifest.capabilities.tasks, vec!["capture"]);
    }

    #[test]
    fn test_defaults_applied() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), r#"{ "id": "p", "entry": "libp.so" }"#);

        let manifest = PluginManifest::load(dir.path()).unwrap();
        assert_eq!(manifest.version, "1.0.0");
        assert_eq!(manifest.name, "");
        assert!(manifest.author.is_none());
        assert!(manifest.capabilities.protocols.is_empty());
        assert!(manifest.capabilities.tasks.is_empty());
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(
            dir.path(),
            r#"{ "id": "p", "entry": "libp.so", "homepage": "https://example.com" }"#,
        );

        assert!(PluginManifest::load(dir.path()).is_ok());
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let err = PluginManifest::load(dir.path()).unwrap_err();
        assert!(matches!(err, HostError::ManifestMissing(_)));
    }

    #[test]
    fn test_unparseable_manifest() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "not json at all");
        let err = PluginManifest::load(dir.path()).unwrap_err();
        assert!(matches!(err, HostError::ManifestInvalid(_)));
    }

    #[test]
    fn test_null_root_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "null");
        let err = PluginManifest::load(dir.path()).unwrap_err();
        assert!(matches!(err, HostError::ManifestInvalid(_)));
    }

    #[test]
    fn test_missing_required_field_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), r#"{ "id": "p" }"#);
        let err = PluginManifest::load(dir.path()).unwrap_err();
        assert!(matches!(err, HostError::ManifestInvalid(_)));
    }

    #[test]
    fn test_empty_id_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), r#"{ "id": "", "entry": "libp.so" }"#);
        let err = PluginManifest::load(dir.path()).unwrap_err();
        assert!(matches!(err, HostError::ManifestInvalid(_)));
    }

    #[test]
    fn test_empty_entry_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), r#"{ "id": "p", "entry": "  " }"#);
        let err = PluginManifest::load(dir.path()).unwrap_err();
        assert!(matches!(err, HostError::ManifestInvalid(_)));
    }
}
