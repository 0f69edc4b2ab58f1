//! # Harbor Plugin API
//!
//! SDK for developing plugins for the Harbor device plugin host.
//!
//! ## Capabilities
//!
//! Every plugin satisfies the base [`Plugin`] lifecycle contract and may
//! additionally implement:
//!
//! - **[`Communicator`]**: timed, cancellable device actions on a named
//!   transport protocol
//! - **[`Processor`]**: named business tasks over JSON parameters
//!
//! ## Example
//!
//! ```rust,no_run
//! use harbor_plugin_api::*;
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct MyPlugin;
//!
//! #[async_trait]
//! impl Plugin for MyPlugin {
//!     fn id(&self) -> &str { "my-plugin" }
//!
//!     async fn activate(&self, context: Arc<dyn PluginContext>) -> Result<()> {
//!         context.log(LogLevel::Info, "activated");
//!         Ok(())
//!     }
//!
//!     async fn deactivate(&self) -> Result<()> {
//!         Ok(())
//!     }
//! }
//! ```

#![deny(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod communicator;
pub mod context;
pub mod declare;
pub mod error;
pub mod event;
pub mod plugin;
pub mod processor;

// Re-export commonly used types
pub use communicator::{CommAction, Communicator, CommunicatorExt};
pub use context::{LogLevel, PluginContext};
pub use declare::{PluginConstructor, PluginDeclaration, PluginRegistrar};
pub use error::{PluginError, Result};
pub use event::PluginEvent;
pub use plugin::Plugin;
pub use processor::Processor;

// Re-export the async primitives plugins implement against
pub use bytes::Bytes;
pub use tokio_util::sync::CancellationToken;

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::communicator::{CommAction, Communicator, CommunicatorExt};
    pub use crate::context::{LogLevel, PluginContext};
    pub use crate::error::{PluginError, Result};
    pub use crate::event::PluginEvent;
    pub use crate::plugin::Plugin;
    pub use crate::processor::Processor;
    pub use async_trait::async_trait;
    pub use bytes::Bytes;
    pub use tokio_util::sync::CancellationToken;
}
