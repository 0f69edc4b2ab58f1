//! Base plugin lifecycle contract

use crate::communicator::Communicator;
use crate::context::PluginContext;
use crate::error::Result;
use crate::processor::Processor;
use async_trait::async_trait;
use std::sync::Arc;

/// Base lifecycle contract every plugin must satisfy
///
/// A plugin type may additionally satisfy the [`Communicator`] and/or
/// [`Processor`] capabilities; the host discovers those through the
/// capability accessors rather than inheritance, so a single type may claim
/// zero, one, or both.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Stable plugin id; must match the manifest's `id`
    fn id(&self) -> &str;

    /// Activate the plugin
    ///
    /// The context stays valid for the plugin's whole lifetime, and calling
    /// back into the host (log, event push, communicator lookup) is safe
    /// from within this method.
    async fn activate(&self, context: Arc<dyn PluginContext>) -> Result<()>;

    /// Deactivate the plugin and release its resources
    async fn deactivate(&self) -> Result<()>;

    /// The plugin's communicator capability, if it has one
    fn as_communicator(self: Arc<Self>) -> Option<Arc<dyn Communicator>> {
        None
    }

    /// The plugin's processor capability, if it has one
    fn as_processor(self: Arc<Self>) -> Option<Arc<dyn Processor>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BarePlugin;

    #[async_trait]
    impl Plugin for BarePlugin {
        fn id(&self) -> &str {
            "bare"
        }

        async fn activate(&self, _context: Arc<dyn PluginContext>) -> Result<()> {
            Ok(())
        }

        async fn deactivate(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_capabilities_default_to_none() {
        let plugin: Arc<dyn Plugin> = Arc::new(BarePlugin);
        assert!(plugin.clone().as_communicator().is_none());
        assert!(plugin.as_processor().is_none());
    }
}
