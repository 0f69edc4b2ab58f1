//! # Harbor Plugin Runtime
//!
//! Discovery, loading and lifecycle management for Harbor device plugins.
//!
//! ## Features
//!
//! - **Batch discovery**: scan a plugins directory, one subdirectory per
//!   plugin, with partial-failure isolation (one bad plugin never aborts
//!   the rest)
//! - **Load pipeline**: manifest → module → instance → activation →
//!   capability registration, each stage with its own failure kind
//! - **Capability arbitration**: protocol and task names are exclusive,
//!   first registration wins, conflicts roll back atomically
//! - **Narrow plugin context**: logging, eventing, communicator lookup and
//!   device-data reads all flow through one facade
//!
//! ## Example
//!
//! ```rust,no_run
//! use harbor_plugin_runtime::PluginManager;
//!
//! # async fn example() -> harbor_plugin_runtime::Result<()> {
//! let manager = PluginManager::new();
//!
//! let report = manager.load_all("plugins").await?;
//! println!("loaded {} plugins", report.loaded);
//!
//! if let Some(comm) = manager.get_communicator("serial") {
//!     // drive the device...
//! }
//!
//! manager.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod context;
pub mod error;
pub mod loader;
pub mod manager;
pub mod manifest;
pub mod registry;

pub use context::{EventSink, LogSink, ManagerContext};
pub use error::{HostError, Result};
pub use loader::{LibraryLoader, LoadedModule, ModuleLoader, PluginDecl, StaticLoader};
pub use manager::{LoadReport, PluginManager};
pub use manifest::{Capabilities, PluginManifest, MANIFEST_FILE};
pub use registry::{CapabilityRegistry, LoadedPlugin};

// Re-export the plugin SDK for host embedders
pub use harbor_plugin_api as api;

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::error::{HostError, Result};
    pub use crate::loader::{LibraryLoader, ModuleLoader, StaticLoader};
    pub use crate::manager::{LoadReport, PluginManager};
    pub use crate::manifest::PluginManifest;
    pub use harbor_plugin_api::prelude::*;
}
