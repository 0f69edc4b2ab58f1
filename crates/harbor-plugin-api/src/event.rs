//! Events raised by plugins and observed by the host

use bytes::Bytes;

/// Event type prefix for device-originated payloads
///
/// The full event type is `"DeviceData:{address}"`, with the source device
/// address after the delimiter.
pub const DEVICE_DATA_PREFIX: &str = "DeviceData";

/// Event type for device disconnect notifications
///
/// The payload is the UTF-8 encoded device address.
pub const DEVICE_DISCONNECTED: &str = "DeviceDisconnected";

/// Delimiter between the `DeviceData` prefix and the device address
pub const EVENT_TYPE_DELIMITER: char = ':';

/// An event pushed by a plugin through its context
///
/// Immutable pair of event type and opaque binary payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginEvent {
    /// Event type string
    pub event_type: String,

    /// Opaque binary payload
    pub data: Bytes,
}

impl PluginEvent {
    /// Create a new event
    pub fn new(event_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            event_type: event_type.into(),
            data: data.into(),
        }
    }

    /// Create a `DeviceData:{address}` event carrying a device payload
    pub fn device_data(address: &str, data: impl Into<Bytes>) -> Self {
        Self {
            event_type: format!("{DEVICE_DATA_PREFIX}{EVENT_TYPE_DELIMITER}{address}"),
            data: data.into(),
        }
    }

    /// Create a `DeviceDisconnected` event for the given device address
    pub fn device_disconnected(address: &str) -> Self {
        Self {
            event_type: DEVICE_DISCONNECTED.to_string(),
            data: Bytes::copy_from_slice(address.as_bytes()),
        }
    }

    /// Check whether this is a `DeviceData` event
    pub fn is_device_data(&self) -> bool {
        self.device_address().is_some()
    }

    /// Source device address, if this is a `DeviceData:{address}` event
    pub fn device_address(&self) -> Option<&str> {
        let (prefix, address) = self.event_type.split_once(EVENT_TYPE_DELIMITER)?;
        if prefix == DEVICE_DATA_PREFIX && !address.is_empty() {
            Some(address)
        } else {
            None
        }
    }

    /// Device address carried in a `DeviceDisconnected` payload, if any
    pub fn disconnected_address(&self) -> Option<String> {
        if self.event_type != DEVICE_DISCONNECTED {
            return None;
        }
        std::str::from_utf8(&self.data).ok().map(str::to_string)
    }
}
