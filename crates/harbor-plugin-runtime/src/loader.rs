//! Module loaders
//!
//! Loading is abstracted behind [`ModuleLoader`], which turns an entry
//! artifact into an opaque [`LoadedModule`] exposing the module's plugin
//! type enumeration. [`LibraryLoader`] loads dynamic libraries through
//! `libloading`; [`StaticLoader`] serves statically-linked modules (built-in
//! plugins, test doubles) behind the same interface. The id-uniqueness and
//! capability-conflict contracts are independent of the mechanism.

use crate::error::{HostError, Result};
use dashmap::DashMap;
use harbor_plugin_api::declare::{
    PluginConstructor, PluginDeclaration, PluginRegistrar, API_VERSION, DECLARATION_SYMBOL,
};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Registration function of a static (in-process) module
pub type RegisterFn = fn(&mut dyn PluginRegistrar);

/// One constructible plugin type discovered in a module
#[derive(Clone)]
pub struct PluginDecl {
    /// Declared type name, for diagnostics
    pub type_name: String,

    /// Constructor for the type
    pub constructor: PluginConstructor,
}

impl fmt::Debug for PluginDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDecl")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// An in-process, callable module produced by a [`ModuleLoader`]
///
/// Keeps the backing library (if any) alive for as long as the handle
/// exists; constructors and the instances they produce must not outlive it.
pub struct LoadedModule {
    decls: Vec<PluginDecl>,
    _library: Option<libloading::Library>,
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("decls", &self.decls)
            .field("dynamic", &self._library.is_some())
            .finish()
    }
}

impl LoadedModule {
    /// Build a module handle from a static registration function
    pub fn from_registrar(register: RegisterFn) -> Self {
        let mut collector = DeclCollector::default();
        register(&mut collector);
        Self {
            decls: collector.decls,
            _library: None,
        }
    }

    /// Build a module handle from an exported declaration
    ///
    /// Rejects the module with [`HostError::LoadFailure`] when it was built
    /// against a different plugin API version than the host.
    pub fn from_declaration(declaration: &PluginDeclaration) -> Result<Self> {
        if declaration.api_version != API_VERSION {
            return Err(HostError::load_failure(format!(
                "plugin built against API {}, host requires {}",
                declaration.api_version, API_VERSION
            )));
        }

        let mut collector = DeclCollector::default();
        (declaration.register)(&mut collector);
        Ok(Self {
            decls: collector.decls,
            _library: None,
        })
    }

    /// The module's plugin type enumeration, in discovery order
    pub fn declarations(&self) -> &[PluginDecl] {
        &self.decls
    }
}

/// Collects a module's type enumeration
#[derive(Default)]
struct DeclCollector {
    decls: Vec<PluginDecl>,
}

impl PluginRegistrar for DeclCollector {
    fn register_type(&mut self, type_name: &'static str, constructor: PluginConstructor) {
        self.decls.push(PluginDecl {
            type_name: type_name.to_string(),
            constructor,
        });
    }
}

/// Resolves and loads an entry artifact into a callable module
pub trait ModuleLoader: Send + Sync + fmt::Debug {
    /// Load the module at `entry`
    ///
    /// Fails with [`HostError::LoadFailure`] wrapping the underlying loader
    /// error when the artifact cannot be loaded or is incompatible.
    fn load(&self, entry: &Path) -> Result<LoadedModule>;
}

/// Dynamic library loader
///
/// Resolves the [`DECLARATION_SYMBOL`] export, checks that the module was
/// built against the same plugin API version as the host, and collects its
/// type enumeration.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibraryLoader;

impl LibraryLoader {
    /// Create a new library loader
    pub fn new() -> Self {
        Self
    }
}

#[allow(unsafe_code)]
impl ModuleLoader for LibraryLoader {
    fn load(&self, entry: &Path) -> Result<LoadedModule> {
        // SAFETY: loading foreign code is inherently unchecked. The version
        // gate below rejects modules built against a different plugin API,
        // which is the only incompatibility we can detect up front.
        unsafe {
            let library = libloading::Library::new(entry).map_err(HostError::load_failure)?;

            let declaration = library
                .get::<*const PluginDeclaration>(DECLARATION_SYMBOL.as_bytes())
                .map_err(|e| {
                    HostError::load_failure(format!("missing plugin declaration: {e}"))
                })?
                .read();

            let mut module = LoadedModule::from_declaration(&declaration)?;
            module._library = Some(library);

            debug!(
                entry = %entry.display(),
                types = module.decls.len(),
                "Loaded dynamic plugin module"
            );

            Ok(module)
        }
    }
}

/// Static module loader
///
/// Maps entry file names to in-process registration functions, so built-in
/// plugins and tests run through the exact same load pipeline as dynamic
/// ones.
#[derive(Clone, Default)]
pub struct StaticLoader {
    modules: Arc<DashMap<String, RegisterFn>>,
}

impl fmt::Debug for StaticLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticLoader")
            .field("modules", &self.modules.len())
            .finish()
    }
}

impl StaticLoader {
    /// Create an empty static loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a static module under an entry file name
    pub fn provide(&self, entry_name: impl Into<String>, register: RegisterFn) {
        self.modules.insert(entry_name.into(), register);
    }
}

impl ModuleLoader for StaticLoader {
    fn load(&self, entry: &Path) -> Result<LoadedModule> {
        let name = entry
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| HostError::load_failure("entry path has no file name"))?;

        let register = self
            .modules
            .get(&name)
            .map(|r| *r.value())
            .ok_or_else(|| {
                HostError::load_failure(format!("no static module registered for '{name}'"))
            })?;

        Ok(LoadedModule::from_registrar(register))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use harbor_plugin_api::{Plugin, PluginContext};
    use std::sync::Arc;

    struct NullPlugin;

    #[async_trait]
    impl Plugin for NullPlugin {
        fn id(&self) -> &str {
            "null"
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
    }

    fn construct_null() -> harbor_plugin_api::Result<Arc<dyn Plugin>> {
        Ok(Arc::new(NullPlugin))
    }

    fn register_null(registrar: &mut dyn PluginRegistrar) {
        registrar.register_type("NullPlugin", construct_null);
    }

    #[test]
    fn test_static_loader_round_trip() {
        let loader = StaticLoader::new();
        loader.provide("libnull.so", register_null);

        let module = loader.load(Path::new("/plugins/null/libnull.so")).unwrap();
        let decls = module.declarations();
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].type_name, "NullPlugin");

        let plugin = (decls[0].constructor)().unwrap();
        assert_eq!(plugin.id(), "null");
    }

    #[test]
    fn test_static_loader_unknown_module() {
        let loader = StaticLoader::new();
        let err = loader.load(Path::new("libmissing.so")).unwrap_err();
        assert!(matches!(err, HostError::LoadFailure(_)));
    }

    #[test]
    fn test_library_loader_missing_file() {
        let loader = LibraryLoader::new();
        let err = loader.load(Path::new("/nonexistent/libplugin.so")).unwrap_err();
        assert!(matches!(err, HostError::LoadFailure(_)));
    }

    #[test]
    fn test_declaration_version_gate() {
        fn register_null_decl(registrar: &mut dyn PluginRegistrar) {
            registrar.register_type("NullPlugin", construct_null);
        }

        let current = PluginDeclaration {
            api_version: API_VERSION,
            register: register_null_decl,
        };
        let module = LoadedModule::from_declaration(&current).unwrap();
        assert_eq!(module.declarations().len(), 1);

        let stale = PluginDeclaration {
            api_version: "0.0.0-legacy",
            register: register_null_decl,
        };
        let err = LoadedModule::from_declaration(&stale).unwrap_err();
        assert!(matches!(err, HostError::LoadFailure(_)));
        assert!(err.to_string().contains("0.0.0-legacy"));
        assert!(err.to_string().contains(API_VERSION));
    }

    #[test]
    fn test_registration_order_is_enumeration_order() {
        fn register_two(registrar: &mut dyn PluginRegistrar) {
            registrar.register_type("First", construct_null);
            registrar.register_type("Second", construct_null);
        }

        let module = LoadedModule::from_registrar(register_two);
        let names: Vec<&str> = module
            .declarations()
            .iter()
            .map(|d| d.type_name.as_str())
            .collect();
        assert_eq!(names, vec!["First", "Second"]);
    }
}
