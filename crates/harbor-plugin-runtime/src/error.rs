//! Host-side error types

use harbor_plugin_api::PluginError;
use std::fmt;
use std::path::PathBuf;

/// Host error type
///
/// Every load-pipeline failure normalizes to one of these variants; batch
/// discovery surfaces them as one human-readable string per failed plugin
/// directory and never aborts the whole pass.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// No manifest file exists in the plugin directory
    #[error("No plugin manifest found in {}", .0.display())]
    ManifestMissing(PathBuf),

    /// The manifest could not be parsed, or a required field is empty
    #[error("Invalid plugin manifest: {0}")]
    ManifestInvalid(String),

    /// A plugin with this id is already registered
    #[error("Duplicate plugin id: {0}")]
    DuplicateId(String),

    /// The manifest's entry artifact does not exist
    #[error("Plugin entry not found: {}", .0.display())]
    EntryNotFound(PathBuf),

    /// The entry artifact could not be loaded as a module
    #[error("Failed to load plugin module: {0}")]
    LoadFailure(String),

    /// The module declares no constructible plugin type
    #[error("No plugin implementation found in module")]
    NoImplementationFound,

    /// A plugin constructor failed or panicked
    #[error("Failed to instantiate plugin: {0}")]
    InstantiationFailure(String),

    /// The plugin's activation entry point failed
    #[error("Plugin activation failed: {0}")]
    ActivationFailure(#[from] PluginError),

    /// The protocol name is already claimed by another plugin
    #[error("Protocol '{protocol}' already registered by plugin '{owner}'")]
    ProtocolConflict {
        /// Conflicting protocol name
        protocol: String,
        /// Id of the plugin that owns it
        owner: String,
    },

    /// The task name is already claimed by another plugin
    #[error("Task '{task}' already registered by plugin '{owner}'")]
    TaskConflict {
        /// Conflicting task name
        task: String,
        /// Id of the plugin that owns it
        owner: String,
    },

    /// The plugin manager has been shut down
    #[error("Plugin host has shut down")]
    HostClosed,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for host operations
pub type Result<T> = std::result::Result<T, HostError>;

impl HostError {
    /// Create a new manifest-invalid error
    pub fn manifest_invalid(msg: impl fmt::Display) -> Self {
        Self::ManifestInvalid(msg.to_string())
    }

    /// Create a new load-failure error
    pub fn load_failure(msg: impl fmt::Display) -> Self {
        Self::LoadFailure(msg.to_string())
    }

    /// Create a new instantiation-failure error
    pub fn instantiation(msg: impl fmt::Display) -> Self {
        Self::InstantiationFailure(msg.to_string())
    }
}
