//! Loopback communicator plugin
//!
//! An in-memory transport that echoes traffic back per device address.
//! Useful for wiring up host integrations and driver code before real
//! hardware is available: `send` queues the payload on the address, `read`
//! drains the queue, `query` echoes immediately.

use async_trait::async_trait;
use harbor_plugin_api::{
    export_plugin, Bytes, CancellationToken, Communicator, LogLevel, Plugin, PluginContext,
    PluginError, PluginEvent, Result,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

const PROTOCOL: &str = "loopback";

#[derive(Default)]
struct Line {
    connected: bool,
    pending: VecDeque<Bytes>,
}

/// In-memory echo transport, one virtual line per device address
#[derive(Default)]
pub struct LoopbackPlugin {
    context: Mutex<Option<Arc<dyn PluginContext>>>,
    lines: Mutex<HashMap<String, Line>>,
}

impl LoopbackPlugin {
    fn log(&self, level: LogLevel, message: &str) {
        if let Some(context) = &*self.context.lock() {
            context.log(level, message);
        }
    }

    fn push_event(&self, event: PluginEvent) {
        if let Some(context) = &*self.context.lock() {
            context.push_event(event);
        }
    }
}

#[async_trait]
impl Plugin for LoopbackPlugin {
    fn id(&self) -> &str {
        "loopback-comm"
    }

    async fn activate(&self, context: Arc<dyn PluginContext>) -> Result<()> {
        context.log(LogLevel::Info, "loopback transport ready");
        *self.context.lock() = Some(context);
        Ok(())
    }

    async fn deactivate(&self) -> Result<()> {
        self.lines.lock().clear();
        self.log(LogLevel::Info, "loopback transport stopped");
        *self.context.lock() = None;
        Ok(())
    }

    fn as_communicator(self: Arc<Self>) -> Option<Arc<dyn Communicator>> {
        Some(self)
    }
}

#[async_trait]
impl Communicator for LoopbackPlugin {
    fn protocol(&self) -> &str {
        PROTOCOL
    }

    async fn execute(
        &self,
        address: &str,
        action: &str,
        payload: Bytes,
        _timeout_ms: u64,
        _cancel: &CancellationToken,
    ) -> Result<Bytes> {
        match action {
            "connect" => {
                self.lines
                    .lock()
                    .entry(address.to_string())
                    .or_default()
                    .connected = true;
                self.log(LogLevel::Debug, &format!("connected '{address}'"));
                Ok(Bytes::new())
            }
            "disconnect" => {
                if let Some(line) = self.lines.lock().get_mut(address) {
                    line.connected = false;
                    line.pending.clear();
                }
                self.log(LogLevel::Debug, &format!("disconnected '{address}'"));
                Ok(Bytes::new())
            }
            "send" => {
                {
                    let mut lines = self.lines.lock();
                    let line = lines
                        .get_mut(address)
                        .filter(|line| line.connected)
                        .ok_or_else(|| {
                            PluginError::transport(format!("'{address}' is not connected"))
                        })?;
                    line.pending.push_back(payload.clone());
                }
                // Looped-back data surfaces as a device event too, like a
                // real transport receiving bytes off the wire.
                self.push_event(PluginEvent::device_data(address, payload));
                Ok(Bytes::new())
            }
            "read" => {
                let mut lines = self.lines.lock();
                let line = lines
                    .get_mut(address)
                    .filter(|line| line.connected)
                    .ok_or_else(|| {
                        PluginError::transport(format!("'{address}' is not connected"))
                    })?;
                Ok(line.pending.pop_front().unwrap_or_default())
            }
            "query" => {
                let lines = self.lines.lock();
                if !lines.get(address).is_some_and(|line| line.connected) {
                    return Err(PluginError::transport(format!(
                        "'{address}' is not connected"
                    )));
                }
                Ok(payload)
            }
            "status" => {
                let connected = self
                    .lines
                    .lock()
                    .get(address)
                    .is_some_and(|line| line.connected);
                Ok(Bytes::from_static(if connected {
                    b"connected"
                } else {
                    b"disconnected"
                }))
            }
            other => Err(PluginError::protocol(format!(
                "loopback does not support action '{other}'"
            ))),
        }
    }
}

fn construct_loopback() -> Result<Arc<dyn Plugin>> {
    Ok(Arc::new(LoopbackPlugin::default()))
}

export_plugin!(construct_loopback);
