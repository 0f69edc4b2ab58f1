//! Host context facade handed to plugins at activation

use crate::communicator::Communicator;
use crate::event::PluginEvent;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Log severity levels accepted by the host log sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Diagnostic detail
    Debug,
    /// Normal operation
    Info,
    /// Something unexpected but recoverable
    Warning,
    /// Operation failed
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// The host facade injected into each plugin at activation
///
/// One instance exists per activated plugin, bound to that plugin's id and
/// directory. A plugin may keep the handle for its whole lifetime but must
/// not use it after its own deactivation.
pub trait PluginContext: Send + Sync {
    /// Id of the plugin this context belongs to
    fn plugin_id(&self) -> &str;

    /// The plugin's home directory
    fn plugin_directory(&self) -> &Path;

    /// Emit a log message to the host
    fn log(&self, level: LogLevel, message: &str);

    /// Look up a registered communicator by protocol name or plugin id
    ///
    /// The protocol registry is consulted first, then the id registry.
    fn communicator(&self, protocol_or_id: &str) -> Option<Arc<dyn Communicator>>;

    /// Push an asynchronous event to the host
    fn push_event(&self, event: PluginEvent);

    /// Read the latest buffered data for a device address, if any
    fn device_data(&self, address: &str) -> Option<Bytes>;
}
