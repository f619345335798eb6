//! Event subscriber
//!
//! Stateless per-call accessor over the cloud relay: each wait opens a fresh
//! subscription, resolves with the first matching event, and releases the
//! subscription on every exit path.

use crate::device::DeviceHandle;
use crate::error::{HarnessError, Result};
use crate::relay::{CloudRelay, EventRecord};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default bound for one event wait: generous enough for a cloud round trip
/// plus device publish latency over flaky connectivity.
pub const DEFAULT_EVENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Awaits named events for one device.
#[derive(Clone)]
pub struct EventSubscriber {
    relay: Arc<dyn CloudRelay>,
    device: DeviceHandle,
    default_timeout: Duration,
}

impl EventSubscriber {
    #[must_use]
    pub fn new(relay: Arc<dyn CloudRelay>, device: DeviceHandle) -> Self {
        Self {
            relay,
            device,
            default_timeout: DEFAULT_EVENT_TIMEOUT,
        }
    }

    /// Overrides the default wait bound.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Waits for the next event named `event_name` using the default timeout.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::SubscriptionTimeout`] if no matching event
    /// arrives in time, or [`HarnessError::Relay`] if the relay fails.
    pub async fn await_event(&self, event_name: &str) -> Result<EventRecord> {
        self.await_event_with_timeout(event_name, self.default_timeout)
            .await
    }

    /// Waits for the next event named `event_name`, bounded by `timeout`.
    ///
    /// Matching is by exact name against events that arrive after the
    /// subscription is established; arrival order at the relay wins over
    /// publish order at the device. Non-matching events are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::SubscriptionTimeout`] if no matching event
    /// arrives within `timeout`, or [`HarnessError::Relay`] if the relay
    /// fails.
    pub async fn await_event_with_timeout(
        &self,
        event_name: &str,
        timeout: Duration,
    ) -> Result<EventRecord> {
        let subscription = self.relay.open_subscription(&self.device).await?;
        debug!(
            device = %self.device.id,
            event = event_name,
            subscription = subscription.id(),
            "waiting for event"
        );

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(HarnessError::SubscriptionTimeout {
                    event: event_name.to_string(),
                    waited: timeout,
                });
            }
            match tokio::time::timeout(remaining, subscription.recv()).await {
                Ok(Ok(record)) if record.name == event_name => return Ok(record),
                Ok(Ok(record)) => {
                    debug!(
                        device = %self.device.id,
                        received = %record.name,
                        awaited = event_name,
                        "discarding non-matching event"
                    );
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    return Err(HarnessError::SubscriptionTimeout {
                        event: event_name.to_string(),
                        waited: timeout,
                    });
                }
            }
        }
    }
}
