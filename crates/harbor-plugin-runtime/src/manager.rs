//! Plugin manager: discovery, the load pipeline, lookups and teardown

use crate::context::{EventSink, LogSink, ManagerContext};
use crate::error::{HostError, Result};
use crate::loader::{LibraryLoader, LoadedModule, ModuleLoader};
use crate::manifest::PluginManifest;
use crate::registry::{CapabilityRegistry, LoadedPlugin};
use bytes::Bytes;
use dashmap::DashMap;
use harbor_plugin_api::{Communicator, LogLevel, PluginEvent, Processor};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::fs;
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one batch discovery pass
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Number of plugins that loaded successfully
    pub loaded: usize,

    /// One human-readable message per failed plugin directory, in
    /// directory-enumeration order
    pub errors: Vec<String>,
}

/// The plugin host
///
/// Owns discovery, validation, loading, activation, capability registration
/// and orderly teardown of all plugins. Constructed once for the process;
/// after [`PluginManager::shutdown`] every lookup returns `None`.
pub struct PluginManager {
    loader: Arc<dyn ModuleLoader>,
    registry: CapabilityRegistry,
    /// Loaded library handles, retained until the manager drops so that
    /// capability handles still held by callers never outlive their code
    modules: Mutex<Vec<LoadedModule>>,
    device_buffer: DashMap<String, Bytes>,
    log_sink: RwLock<Option<LogSink>>,
    event_sink: RwLock<Option<EventSink>>,
    shutdown_started: AtomicBool,
}

impl fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManager")
            .field("loader", &self.loader)
            .field("registry", &self.registry)
            .field("buffered_devices", &self.device_buffer.len())
            .finish()
    }
}

impl PluginManager {
    /// Create a manager that loads dynamic library plugins
    pub fn new() -> Arc<Self> {
        Self::with_loader(Arc::new(LibraryLoader::new()))
    }

    /// Create a manager with a custom module loader
    pub fn with_loader(loader: Arc<dyn ModuleLoader>) -> Arc<Self> {
        Arc::new(Self {
            loader,
            registry: CapabilityRegistry::new(),
            modules: Mutex::new(Vec::new()),
            device_buffer: DashMap::new(),
            log_sink: RwLock::new(None),
            event_sink: RwLock::new(None),
            shutdown_started: AtomicBool::new(false),
        })
    }

    /// The underlying capability registry
    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Install the host log callback
    ///
    /// Single subscriber; installing a new sink replaces the previous one.
    pub fn set_log_sink(&self, sink: impl Fn(LogLevel, &str, &str) + Send + Sync + 'static) {
        *self.log_sink.write() = Some(Box::new(sink));
    }

    /// Install the host event callback
    ///
    /// Single subscriber; installing a new sink replaces the previous one.
    pub fn set_event_sink(&self, sink: impl Fn(PluginEvent) + Send + Sync + 'static) {
        *self.event_sink.write() = Some(Box::new(sink));
    }

    /// Discover and load every plugin under `root`
    ///
    /// Creates `root` if it does not exist (reporting zero loads), then runs
    /// the full load pipeline independently per immediate subdirectory, in
    /// sorted path order. One directory's failure is recorded and never
    /// stops the remaining directories. Directories that already own a
    /// loaded plugin are skipped, so repeated calls pick up only
    /// newly-appearing plugins.
    pub async fn load_all(self: &Arc<Self>, root: impl AsRef<Path>) -> Result<LoadReport> {
        let root = root.as_ref();
        if self.registry.is_closed() {
            return Err(HostError::HostClosed);
        }

        if !root.exists() {
            fs::create_dir_all(root)?;
            info!(root = %root.display(), "Created empty plugins directory");
            return Ok(LoadReport::default());
        }

        let mut report = LoadReport::default();
        let mut dirs: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(root)? {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    // An unreadable entry is a failed plugin directory like
                    // any other; it must not vanish from the report.
                    warn!(root = %root.display(), error = %e, "Unreadable directory entry");
                    report.errors.push(format!("{}: {e}", root.display()));
                    continue;
                }
            };
            if path.is_dir() {
                dirs.push(path);
            }
        }
        dirs.sort();

        for dir in dirs {
            if self.registry.owns_directory(&dir) {
                debug!(dir = %dir.display(), "Plugin already loaded, skipping");
                continue;
            }

            match self.load_plugin(&dir).await {
                Ok(id) => {
                    debug!(plugin = %id, dir = %dir.display(), "Plugin loaded from directory");
                    report.loaded += 1;
                }
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Plugin load failed");
                    report.errors.push(format!("{}: {e}", dir.display()));
                }
            }
        }

        info!(
            loaded = report.loaded,
            failed = report.errors.len(),
            "Plugin discovery finished"
        );
        Ok(report)
    }

    /// Run the full load pipeline for one plugin directory
    ///
    /// Manifest → module → instance → activation → registration. Returns the
    /// plugin id on success; on any failure the plugin ends up in no
    /// registry at all.
    pub async fn load_plugin(self: &Arc<Self>, dir: &Path) -> Result<String> {
        if self.registry.is_closed() {
            return Err(HostError::HostClosed);
        }

        let manifest = PluginManifest::load(dir)?;

        // Checked before any module I/O so a duplicate costs no load work.
        if self.registry.contains(&manifest.id) {
            return Err(HostError::DuplicateId(manifest.id));
        }

        let entry = dir.join(&manifest.entry);
        if !entry.exists() {
            return Err(HostError::EntryNotFound(entry));
        }

        let module = self.loader.load(&entry)?;

        let decl = module
            .declarations()
            .first()
            .cloned()
            .ok_or(HostError::NoImplementationFound)?;
        if module.declarations().len() > 1 {
            // Enumeration order is implementation-defined; callers must not
            // rely on it across module rebuilds.
            debug!(
                plugin = %manifest.id,
                selected = %decl.type_name,
                "Module declares multiple plugin types, using first"
            );
        }

        let instance = match panic::catch_unwind(decl.constructor) {
            Ok(Ok(instance)) => instance,
            Ok(Err(e)) => return Err(HostError::instantiation(e)),
            Err(_) => {
                return Err(HostError::instantiation(format!(
                    "constructor of '{}' panicked",
                    decl.type_name
                )))
            }
        };

        if instance.id() != manifest.id {
            warn!(
                manifest_id = %manifest.id,
                instance_id = %instance.id(),
                "Plugin instance id differs from manifest, manifest id wins"
            );
        }

        let context = Arc::new(ManagerContext::new(&manifest.id, dir, Arc::downgrade(self)));
        instance.activate(context).await?;

        let loaded = LoadedPlugin {
            manifest: manifest.clone(),
            directory: dir.to_path_buf(),
            instance: instance.clone(),
        };

        match self.registry.register(loaded) {
            Ok(_) => {
                self.modules.lock().push(module);
                info!(
                    plugin = %manifest.id,
                    version = %manifest.version,
                    "Plugin loaded"
                );
                Ok(manifest.id)
            }
            Err(e) => {
                // Already activated but now unregistrable: shut it back down
                // so it does not keep running unobserved.
                if let Err(deactivation) = instance.deactivate().await {
                    warn!(
                        plugin = %manifest.id,
                        error = %deactivation,
                        "Deactivation after failed registration also failed"
                    );
                }
                Err(e)
            }
        }
    }

    /// The communicator registered for an exact protocol name
    pub fn get_communicator(&self, protocol: &str) -> Option<Arc<dyn Communicator>> {
        self.registry.communicator(protocol)
    }

    /// The communicator owned by the plugin with this id
    ///
    /// Distinct lookup path used for explicit binding when several plugins
    /// could serve the same protocol.
    pub fn get_communicator_by_id(&self, plugin_id: &str) -> Option<Arc<dyn Communicator>> {
        self.registry.communicator_by_id(plugin_id)
    }

    /// The processor registered for an exact task name
    pub fn get_processor(&self, task: &str) -> Option<Arc<dyn Processor>> {
        self.registry.processor(task)
    }

    /// All registered protocol names
    pub fn registered_protocols(&self) -> Vec<String> {
        self.registry.protocols()
    }

    /// All registered task names
    pub fn registered_tasks(&self) -> Vec<String> {
        self.registry.tasks()
    }

    /// All registered plugin ids
    pub fn plugin_ids(&self) -> Vec<String> {
        self.registry.plugin_ids()
    }

    /// Whether a plugin with this id is loaded
    pub fn has_plugin(&self, id: &str) -> bool {
        self.registry.contains(id)
    }

    /// Number of loaded plugins
    pub fn plugin_count(&self) -> usize {
        self.registry.plugin_count()
    }

    /// Inject a communicator directly, bypassing the load pipeline
    ///
    /// Administrative override used to seed built-ins and test doubles;
    /// silently replaces any existing entry for the protocol.
    pub fn register_communicator(
        &self,
        protocol: impl Into<String>,
        comm: Arc<dyn Communicator>,
    ) {
        self.registry.insert_communicator(protocol, comm);
    }

    /// Inject a processor directly, bypassing the load pipeline
    ///
    /// Administrative override; silently replaces any existing entry for
    /// the task name.
    pub fn register_processor(&self, task: impl Into<String>, processor: Arc<dyn Processor>) {
        self.registry.insert_processor(task, processor);
    }

    /// Latest buffered payload for a device address
    pub fn device_data(&self, address: &str) -> Option<Bytes> {
        self.device_buffer.get(address).map(|e| e.clone())
    }

    /// Deactivate every loaded plugin and clear the registries
    ///
    /// Each plugin's deactivation failure is logged and never stops the
    /// others. Safe to call more than once; only the first call does
    /// anything. Afterwards every lookup returns `None`.
    pub async fn shutdown(&self) {
        if self.shutdown_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let plugins = self.registry.snapshot();
        info!(count = plugins.len(), "Shutting down plugin host");

        for plugin in plugins {
            if let Err(e) = plugin.instance.deactivate().await {
                warn!(
                    plugin = %plugin.manifest.id,
                    error = %e,
                    "Plugin deactivation failed"
                );
            }
        }

        self.registry.close();
        self.device_buffer.clear();
    }

    pub(crate) fn forward_log(&self, level: LogLevel, source: &str, message: &str) {
        if let Some(sink) = &*self.log_sink.read() {
            sink(level, source, message);
        }
    }

    pub(crate) fn dispatch_event(&self, plugin_id: &str, event: PluginEvent) {
        if let Some(address) = event.device_address() {
            self.device_buffer
                .insert(address.to_string(), event.data.clone());
        } else if let Some(address) = event.disconnected_address() {
            self.device_buffer.remove(&address);
        }

        debug!(
            plugin = %plugin_id,
            event = %event.event_type,
            bytes = event.data.len(),
            "Plugin event"
        );

        if let Some(sink) = &*self.event_sink.read() {
            sink(event);
        }
    }
}
