//! Host-side implementation of the plugin context facade

use crate::manager::PluginManager;
use bytes::Bytes;
use harbor_plugin_api::{Communicator, LogLevel, PluginContext, PluginEvent};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// Host callback receiving `(level, source label, message)` log entries
pub type LogSink = Box<dyn Fn(LogLevel, &str, &str) + Send + Sync>;

/// Host callback receiving events pushed by plugins
pub type EventSink = Box<dyn Fn(PluginEvent) + Send + Sync>;

/// Context bound to one activated plugin
///
/// Holds the plugin's identity and a weak back-reference to the manager;
/// once the manager is gone every delegated operation degrades to a no-op
/// or `None`.
pub struct ManagerContext {
    plugin_id: String,
    directory: PathBuf,
    manager: Weak<PluginManager>,
}

impl fmt::Debug for ManagerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerContext")
            .field("plugin_id", &self.plugin_id)
            .field("directory", &self.directory)
            .finish()
    }
}

impl ManagerContext {
    pub(crate) fn new(plugin_id: &str, directory: &Path, manager: Weak<PluginManager>) -> Self {
        Self {
            plugin_id: plugin_id.to_string(),
            directory: directory.to_path_buf(),
            manager,
        }
    }
}

impl PluginContext for ManagerContext {
    fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    fn plugin_directory(&self) -> &Path {
        &self.directory
    }

    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => debug!(plugin = %self.plugin_id, "{message}"),
            LogLevel::Info => info!(plugin = %self.plugin_id, "{message}"),
            LogLevel::Warning => warn!(plugin = %self.plugin_id, "{message}"),
            LogLevel::Error => error!(plugin = %self.plugin_id, "{message}"),
        }

        if let Some(manager) = self.manager.upgrade() {
            manager.forward_log(level, &self.plugin_id, message);
        }
    }

    fn communicator(&self, protocol_or_id: &str) -> Option<Arc<dyn Communicator>> {
        let manager = self.manager.upgrade()?;
        manager
            .get_communicator(protocol_or_id)
            .or_else(|| manager.get_communicator_by_id(protocol_or_id))
    }

    fn push_event(&self, event: PluginEvent) {
        if let Some(manager) = self.manager.upgrade() {
            manager.dispatch_event(&self.plugin_id, event);
        }
    }

    fn device_data(&self, address: &str) -> Option<Bytes> {
        self.manager.upgrade()?.device_data(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orphaned_context_degrades_gracefully() {
        let context = ManagerContext::new("p", Path::new("/plugins/p"), Weak::new());

        assert_eq!(context.plugin_id(), "p");
        assert_eq!(context.plugin_directory(), Path::new("/plugins/p"));
        assert!(context.communicator("serial").is_none());
        assert!(context.device_data("COM1").is_none());

        // Neither of these may panic once the manager is gone.
        context.log(LogLevel::Info, "late message");
        context.push_event(PluginEvent::new("Late", Bytes::new()));
    }
}
