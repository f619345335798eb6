//! Cloud relay interface
//!
//! The relay is an opaque push source of named event records. The harness
//! consumes it through [`CloudRelay`]; the relay side delivers records into a
//! per-subscription channel, mirroring how a broker pushes publishes to each
//! connected client.

use crate::device::DeviceHandle;
use crate::error::{HarnessError, Result};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// A named, timestamped event record relayed from a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub name: String,
    pub data: String,
    pub received_at: SystemTime,
}

/// Streaming subscription to a device's event stream.
///
/// Holds the receiving end of the relay's delivery channel plus a close hook
/// that releases the relay-side resource. The hook runs on drop, so every
/// exit path out of a wait (first match, timeout, harness error) releases the
/// subscription.
pub struct EventSubscription {
    id: Arc<str>,
    receiver: flume::Receiver<EventRecord>,
    on_close: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl EventSubscription {
    /// Creates a subscription from a delivery channel and a close hook.
    #[must_use]
    pub fn new(
        id: impl Into<Arc<str>>,
        receiver: flume::Receiver<EventRecord>,
        on_close: Box<dyn FnOnce() + Send + Sync>,
    ) -> Self {
        Self {
            id: id.into(),
            receiver,
            on_close: Some(on_close),
        }
    }

    /// Returns the relay-assigned subscription id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Receives the next event record in arrival order.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Relay`] if the relay closed the delivery
    /// channel.
    pub async fn recv(&self) -> Result<EventRecord> {
        self.receiver.recv_async().await.map_err(|_| {
            HarnessError::Relay(format!("subscription {} closed by relay", self.id))
        })
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        if let Some(on_close) = self.on_close.take() {
            debug!(subscription = %self.id, "releasing subscription");
            on_close();
        }
    }
}

/// Cloud relay collaborator: publishes and subscribes named events.
///
/// The harness never reimplements the relay; it only opens subscriptions and
/// reads records off them.
pub trait CloudRelay: Send + Sync {
    /// Opens a streaming subscription to `device`'s event stream.
    ///
    /// Events published before the subscription is established are not
    /// delivered.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay refuses the subscription.
    fn open_subscription<'a>(
        &'a self,
        device: &'a DeviceHandle,
    ) -> Pin<Box<dyn Future<Output = Result<EventSubscription>> + Send + 'a>>;
}
