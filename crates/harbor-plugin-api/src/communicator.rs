//! Device communication capability and the action vocabulary

use crate::error::{PluginError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default timeout for the `connect` wrapper, in milliseconds
pub const CONNECT_TIMEOUT_MS: u64 = 5000;

/// Default timeout for the `disconnect` wrapper, in milliseconds
pub const DISCONNECT_TIMEOUT_MS: u64 = 1000;

/// Default timeout for the `status` wrapper, in milliseconds
pub const STATUS_TIMEOUT_MS: u64 = 1000;

/// Closed vocabulary of communication actions
///
/// [`Communicator::execute`] accepts any action string so plugins may extend
/// the set, but the host-side wrappers in [`CommunicatorExt`] only emit
/// these names, case-folded to lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommAction {
    /// Open the connection to a device
    Connect,
    /// Close the connection to a device
    Disconnect,
    /// Write a payload without awaiting a response
    Send,
    /// Read pending data from a device
    Read,
    /// Write a payload and await the response
    Query,
    /// Probe the connection state
    Status,
}

impl CommAction {
    /// Lowercase wire name of this action
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Send => "send",
            Self::Read => "read",
            Self::Query => "query",
            Self::Status => "status",
        }
    }
}

impl fmt::Display for CommAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Device communication capability
///
/// A plugin implementing this contract executes timed, cancellable actions
/// against a device address on its claimed transport protocol.
#[async_trait]
pub trait Communicator: Send + Sync {
    /// Transport protocol name (e.g. "serial", "scpi", "tcp")
    fn protocol(&self) -> &str;

    /// Execute an action against a device address
    ///
    /// `timeout_ms` of 0 means no deadline. Implementations must honor both
    /// the timeout and the cancellation token, and must report cancellation
    /// as [`PluginError::Cancelled`] rather than [`PluginError::Timeout`].
    async fn execute(
        &self,
        address: &str,
        action: &str,
        payload: Bytes,
        timeout_ms: u64,
        cancel: &CancellationToken,
    ) -> Result<Bytes>;
}

/// Runs an enumerated action with host-side cancellation and deadline guards.
///
/// Cancellation wins over the deadline even when both have elapsed; a token
/// that is already cancelled short-circuits before the action starts.
async fn execute_guarded<C>(
    comm: &C,
    address: &str,
    action: CommAction,
    payload: Bytes,
    timeout_ms: u64,
    cancel: &CancellationToken,
) -> Result<Bytes>
where
    C: Communicator + ?Sized,
{
    if cancel.is_cancelled() {
        return Err(PluginError::Cancelled);
    }

    let call = comm.execute(address, action.as_str(), payload, timeout_ms, cancel);

    if timeout_ms == 0 {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PluginError::Cancelled),
            result = call => result,
        }
    } else {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PluginError::Cancelled),
            result = tokio::time::timeout(Duration::from_millis(timeout_ms), call) => {
                match result {
                    Ok(inner) => inner,
                    Err(_) => Err(PluginError::Timeout(timeout_ms)),
                }
            }
        }
    }
}

/// Convenience wrappers over [`Communicator::execute`]
///
/// Each wrapper maps one [`CommAction`] to the uniform execute call with its
/// documented default timeout. Blanket-implemented for every communicator.
#[async_trait]
pub trait CommunicatorExt: Communicator {
    /// Open the connection to `address` (5 s default timeout)
    async fn connect(&self, address: &str, cancel: &CancellationToken) -> Result<Bytes> {
        execute_guarded(
            self,
            address,
            CommAction::Connect,
            Bytes::new(),
            CONNECT_TIMEOUT_MS,
            cancel,
        )
        .await
    }

    /// Close the connection to `address` (1 s default timeout)
    async fn disconnect(&self, address: &str, cancel: &CancellationToken) -> Result<Bytes> {
        execute_guarded(
            self,
            address,
            CommAction::Disconnect,
            Bytes::new(),
            DISCONNECT_TIMEOUT_MS,
            cancel,
        )
        .await
    }

    /// Fire-and-forget write to `address`
    ///
    /// The payload is passed through unmodified with timeout 0; no response
    /// is awaited and any response bytes are discarded.
    async fn send(&self, address: &str, payload: Bytes, cancel: &CancellationToken) -> Result<()> {
        execute_guarded(self, address, CommAction::Send, payload, 0, cancel).await?;
        Ok(())
    }

    /// Read pending data from `address` with a caller-supplied timeout
    async fn read(
        &self,
        address: &str,
        timeout_ms: u64,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        execute_guarded(
            self,
            address,
            CommAction::Read,
            Bytes::new(),
            timeout_ms,
            cancel,
        )
        .await
    }

    /// Write `payload` and await the response, with a caller-supplied timeout
    async fn query(
        &self,
        address: &str,
        payload: Bytes,
        timeout_ms: u64,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        execute_guarded(self, address, CommAction::Query, payload, timeout_ms, cancel).await
    }

    /// Probe the connection state of `address` (1 s default timeout)
    async fn status(&self, address: &str, cancel: &CancellationToken) -> Result<Bytes> {
        execute_guarded(
            self,
            address,
            CommAction::Status,
            Bytes::new(),
            STATUS_TIMEOUT_MS,
            cancel,
        )
        .await
    }
}

#[async_trait]
impl<C: Communicator + ?Sized> CommunicatorExt for C {}
