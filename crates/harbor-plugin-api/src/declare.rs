//! Dynamic-module export declaration
//!
//! A loadable plugin module exports exactly one [`PluginDeclaration`] static
//! under [`DECLARATION_SYMBOL`], normally through [`export_plugin!`]. The
//! host reads the declaration, checks the API version both sides were built
//! against, and asks `register` to enumerate the module's constructible
//! plugin types.

use crate::error::Result;
use crate::plugin::Plugin;
use std::sync::Arc;

/// The API version this crate was compiled with
///
/// Baked into every plugin at build time and compared by the host before
/// anything else in the module is touched.
pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exported symbol name the host resolves in a plugin module
pub const DECLARATION_SYMBOL: &str = "harbor_plugin_declaration";

/// Constructor for one concrete plugin type
pub type PluginConstructor = fn() -> Result<Arc<dyn Plugin>>;

/// Declaration exported by a plugin module
#[derive(Debug)]
pub struct PluginDeclaration {
    /// [`API_VERSION`] the module was built against
    pub api_version: &'static str,

    /// Enumerates the module's plugin types into a registrar
    ///
    /// Registration order is the module's discovery order; the host selects
    /// the first registered type and this ordering is implementation-defined
    /// across rebuilds.
    pub register: fn(&mut dyn PluginRegistrar),
}

/// Receiver for a module's plugin type enumeration
pub trait PluginRegistrar {
    /// Register one constructible plugin type
    fn register_type(&mut self, type_name: &'static str, constructor: PluginConstructor);
}

/// Export a plugin declaration from a cdylib plugin crate
///
/// Takes one or more constructor paths of type [`PluginConstructor`]:
///
/// ```ignore
/// fn construct() -> harbor_plugin_api::Result<Arc<dyn Plugin>> {
///     Ok(Arc::new(MyPlugin::default()))
/// }
///
/// harbor_plugin_api::export_plugin!(construct);
/// ```
#[macro_export]
macro_rules! export_plugin {
    ($($constructor:path),+ $(,)?) => {
        #[doc(hidden)]
        #[no_mangle]
        #[allow(non_upper_case_globals, unsafe_code)]
        pub static harbor_plugin_declaration: $crate::declare::PluginDeclaration =
            $crate::declare::PluginDeclaration {
                api_version: $crate::declare::API_VERSION,
                register: |registrar| {
                    $(registrar.register_type(stringify!($constructor), $constructor);)+
                },
            };
    };
}
