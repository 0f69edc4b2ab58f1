//! Capability registries
//!
//! Three string-keyed registries owned by the manager: plugin-id → loaded
//! plugin, protocol-name → communicator, task-name → processor. Pipeline
//! registration requires uniqueness of every key (first registration wins);
//! manual registration is an administrative override that replaces existing
//! entries without conflict checks.

use crate::error::{HostError, Result};
use crate::manifest::PluginManifest;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use harbor_plugin_api::{Communicator, Plugin, Processor};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Owner label used for manually registered capabilities
pub const HOST_OWNER: &str = "host";

/// The manager's record of one successfully loaded plugin
///
/// Created exactly once per successful load and never mutated afterwards;
/// removed from the registries only at teardown.
pub struct LoadedPlugin {
    /// The plugin's manifest
    pub manifest: PluginManifest,

    /// The plugin's home directory
    pub directory: PathBuf,

    /// The live plugin instance
    pub instance: Arc<dyn Plugin>,
}

impl fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("id", &self.manifest.id)
            .field("directory", &self.directory)
            .finish()
    }
}

/// The three capability registries
///
/// All inserts go through atomic insert-if-absent so conflict detection is
/// race-free under concurrent loads. Once closed, every lookup returns
/// `None`.
#[derive(Default)]
pub struct CapabilityRegistry {
    plugins: DashMap<String, Arc<LoadedPlugin>>,
    communicators: DashMap<String, (String, Arc<dyn Communicator>)>,
    processors: DashMap<String, (String, Arc<dyn Processor>)>,
    closed: AtomicBool,
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("plugins", &self.plugins.len())
            .field("communicators", &self.communicators.len())
            .field("processors", &self.processors.len())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl CapabilityRegistry {
    /// Create a new, empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a plugin with this id is registered
    pub fn contains(&self, id: &str) -> bool {
        !self.is_closed() && self.plugins.contains_key(id)
    }

    /// Whether any loaded plugin owns this directory
    pub fn owns_directory(&self, dir: &std::path::Path) -> bool {
        self.plugins.iter().any(|p| p.directory == dir)
    }

    /// Register a loaded plugin and its declared capabilities
    ///
    /// Inserts into the id registry first, then claims every declared
    /// protocol and task name. A conflict on any single name rolls back all
    /// keys inserted for this plugin, so it never ends up partially
    /// registered. Fails with [`HostError::HostClosed`] once the registry
    /// has been closed, so a load racing a shutdown cannot slip a plugin
    /// past the teardown pass.
    pub fn register(&self, plugin: LoadedPlugin) -> Result<Arc<LoadedPlugin>> {
        if self.is_closed() {
            return Err(HostError::HostClosed);
        }

        let id = plugin.manifest.id.clone();
        let plugin = Arc::new(plugin);

        match self.plugins.entry(id.clone()) {
            Entry::Occupied(_) => return Err(HostError::DuplicateId(id)),
            Entry::Vacant(vacant) => {
                vacant.insert(plugin.clone());
            }
        }

        let mut claimed_protocols = Vec::new();
        if let Some(communicator) = plugin.instance.clone().as_communicator() {
            for protocol in &plugin.manifest.capabilities.protocols {
                match self.communicators.entry(protocol.clone()) {
                    Entry::Occupied(occupied) => {
                        let owner = occupied.get().0.clone();
                        drop(occupied);
                        self.rollback(&id, &claimed_protocols, &[]);
                        return Err(HostError::ProtocolConflict {
                            protocol: protocol.clone(),
                            owner,
                        });
                    }
                    Entry::Vacant(vacant) => {
                        vacant.insert((id.clone(), communicator.clone()));
                        claimed_protocols.push(protocol.clone());
                    }
                }
            }
        }

        let mut claimed_tasks = Vec::new();
        if let Some(processor) = plugin.instance.clone().as_processor() {
            for task in &plugin.manifest.capabilities.tasks {
                match self.processors.entry(task.clone()) {
                    Entry::Occupied(occupied) => {
                        let owner = occupied.get().0.clone();
                        drop(occupied);
                        self.rollback(&id, &claimed_protocols, &claimed_tasks);
                        return Err(HostError::TaskConflict {
                            task: task.clone(),
                            owner,
                        });
                    }
                    Entry::Vacant(vacant) => {
                        vacant.insert((id.clone(), processor.clone()));
                        claimed_tasks.push(task.clone());
                    }
                }
            }
        }

        info!(
            plugin = %id,
            protocols = claimed_protocols.len(),
            tasks = claimed_tasks.len(),
            "Plugin registered"
        );

        Ok(plugin)
    }

    /// Remove every key inserted for a plugin whose registration failed
    fn rollback(&self, id: &str, protocols: &[String], tasks: &[String]) {
        for protocol in protocols {
            self.communicators.remove(protocol);
        }
        for task in tasks {
            self.processors.remove(task);
        }
        self.plugins.remove(id);
        debug!(plugin = %id, "Registration rolled back");
    }

    /// Replace the communicator for a protocol, bypassing conflict checks
    pub fn insert_communicator(&self, protocol: impl Into<String>, comm: Arc<dyn Communicator>) {
        let protocol = protocol.into();
        debug!(protocol = %protocol, "Communicator registered manually");
        self.communicators
            .insert(protocol, (HOST_OWNER.to_string(), comm));
    }

    /// Replace the processor for a task name, bypassing conflict checks
    pub fn insert_processor(&self, task: impl Into<String>, processor: Arc<dyn Processor>) {
        let task = task.into();
        debug!(task = %task, "Processor registered manually");
        self.processors
            .insert(task, (HOST_OWNER.to_string(), processor));
    }

    /// The communicator registered for an exact protocol name
    pub fn communicator(&self, protocol: &str) -> Option<Arc<dyn Communicator>> {
        if self.is_closed() {
            return None;
        }
        self.communicators.get(protocol).map(|e| e.1.clone())
    }

    /// The communicator owned by the plugin with this id
    pub fn communicator_by_id(&self, plugin_id: &str) -> Option<Arc<dyn Communicator>> {
        if self.is_closed() {
            return None;
        }
        let plugin = self.plugins.get(plugin_id)?;
        plugin.instance.clone().as_communicator()
    }

    /// The processor registered for an exact task name
    pub fn processor(&self, task: &str) -> Option<Arc<dyn Processor>> {
        if self.is_closed() {
            return None;
        }
        self.processors.get(task).map(|e| e.1.clone())
    }

    /// The loaded plugin with this id
    pub fn plugin(&self, id: &str) -> Option<Arc<LoadedPlugin>> {
        if self.is_closed() {
            return None;
        }
        self.plugins.get(id).map(|e| e.clone())
    }

    /// All registered protocol names
    pub fn protocols(&self) -> Vec<String> {
        if self.is_closed() {
            return Vec::new();
        }
        self.communicators.iter().map(|e| e.key().clone()).collect()
    }

    /// All registered task names
    pub fn tasks(&self) -> Vec<String> {
        if self.is_closed() {
            return Vec::new();
        }
        self.processors.iter().map(|e| e.key().clone()).collect()
    }

    /// All registered plugin ids
    pub fn plugin_ids(&self) -> Vec<String> {
        if self.is_closed() {
            return Vec::new();
        }
        self.plugins.iter().map(|e| e.key().clone()).collect()
    }

    /// Number of registered plugins
    pub fn plugin_count(&self) -> usize {
        if self.is_closed() {
            return 0;
        }
        self.plugins.len()
    }

    /// Snapshot of every loaded plugin, for teardown
    pub fn snapshot(&self) -> Vec<Arc<LoadedPlugin>> {
        self.plugins.iter().map(|e| e.clone()).collect()
    }

    /// Whether the registry has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close the registry and clear all three mappings
    ///
    /// The closed flag is raised before anything is removed, so no lookup
    /// ever observes a half-cleared registry.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.plugins.clear();
        self.communicators.clear();
        self.processors.clear();
        info!("Capability registries cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Capabilities;
    use async_trait::async_trait;
    use harbor_plugin_api::{Bytes, CancellationToken, PluginContext};

    struct CommPlugin {
        id: String,
        protocol: String,
    }

    #[async_trait]
    impl Plugin for CommPlugin {
        fn id(&self) -> &str {
            &self.id
        }

        async fn activate(
            &self,
            _context: Arc<dyn PluginContext>,
        ) -> harbor_plugin_api::Result<()> {
            Ok(())
        }

        async fn deactivate(&self) -> harbor_plugin_api::Result<()> {
            Ok(())
        }

        fn as_communicator(self: Arc<Self>) -> Option<Arc<dyn Communicator>> {
            Some(self)
        }
    }

    #[async_trait]
    impl Communicator for CommPlugin {
        fn protocol(&self) -> &str {
            &self.protocol
        }

        async fn execute(
            &self,
            _address: &str,
            _action: &str,
            payload: Bytes,
            _timeout_ms: u64,
            _cancel: &CancellationToken,
        ) -> harbor_plugin_api::Result<Bytes> {
            Ok(payload)
        }
    }

    fn loaded(id: &str, protocols: &[&str]) -> LoadedPlugin {
        let manifest = PluginManifest {
            id: id.to_string(),
            name: String::new(),
            version: "1.0.0".to_string(),
            author: None,
            entry: "lib.so".to_string(),
            capabilities: Capabilities {
                protocols: protocols.iter().map(|p| p.to_string()).collect(),
                tasks: Vec::new(),
            },
        };
        LoadedPlugin {
            manifest,
            directory: PathBuf::from("/plugins").join(id),
            instance: Arc::new(CommPlugin {
                id: id.to_string(),
                protocol: protocols.first().unwrap_or(&"none").to_string(),
            }),
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = CapabilityRegistry::new();
        registry.register(loaded("a", &["serial"])).unwrap();

        assert!(registry.contains("a"));
        assert!(registry.communicator("serial").is_some());
        assert!(registry.communicator("nonexistent").is_none());
        assert!(registry.communicator_by_id("a").is_some());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let registry = CapabilityRegistry::new();
        registry.register(loaded("a", &["serial"])).unwrap();

        let err = registry.register(loaded("a", &["tcp"])).unwrap_err();
        assert!(matches!(err, HostError::DuplicateId(_)));
        // The original registration is untouched.
        assert!(registry.communicator("serial").is_some());
        assert!(registry.communicator("tcp").is_none());
    }

    #[test]
    fn test_protocol_conflict_rolls_back_everything() {
        let registry = CapabilityRegistry::new();
        registry.register(loaded("a", &["scpi"])).unwrap();

        let err = registry.register(loaded("b", &["modbus", "scpi"])).unwrap_err();
        assert!(matches!(
            err,
            HostError::ProtocolConflict { ref owner, .. } if owner == "a"
        ));

        // Nothing of plugin b survives, including the name it claimed first.
        assert!(!registry.contains("b"));
        assert!(registry.communicator("modbus").is_none());
        assert!(registry.communicator("scpi").is_some());
    }

    #[test]
    fn test_manual_registration_overwrites() {
        let registry = CapabilityRegistry::new();
        registry.register(loaded("a", &["serial"])).unwrap();

        let replacement = Arc::new(CommPlugin {
            id: "builtin".to_string(),
            protocol: "serial".to_string(),
        });
        registry.insert_communicator("serial", replacement.clone());

        let resolved = registry.communicator("serial").unwrap();
        assert!(Arc::ptr_eq(
            &resolved,
            &(replacement as Arc<dyn Communicator>)
        ));
    }

    #[test]
    fn test_closed_registry_rejects_registration() {
        let registry = CapabilityRegistry::new();
        registry.close();

        let err = registry.register(loaded("late", &["serial"])).unwrap_err();
        assert!(matches!(err, HostError::HostClosed));
        assert!(registry.communicator("serial").is_none());
    }

    #[test]
    fn test_closed_registry_returns_nothing() {
        let registry = CapabilityRegistry::new();
        registry.register(loaded("a", &["serial"])).unwrap();

        registry.close();

        assert!(!registry.contains("a"));
        assert!(registry.communicator("serial").is_none());
        assert!(registry.communicator_by_id("a").is_none());
        assert!(registry.protocols().is_empty());
        assert_eq!(registry.plugin_count(), 0);
    }
}
