//! Per-case test context
//!
//! Each test body receives an explicit [`TestContext`] carrying the bound
//! device, an event subscriber, and the platform registry used to
//! parameterize assertions.

use crate::device::DeviceHandle;
use crate::error::Result;
use crate::limits;
use crate::platform::PlatformRegistry;
use crate::relay::{CloudRelay, EventRecord};
use crate::subscriber::EventSubscriber;
use std::sync::Arc;
use std::time::Duration;

/// Context injected into a test body for one (case, device) execution.
#[derive(Clone)]
pub struct TestContext {
    pub device: DeviceHandle,
    pub subscriber: EventSubscriber,
    registry: Arc<PlatformRegistry>,
}

impl TestContext {
    #[must_use]
    pub fn new(
        device: DeviceHandle,
        relay: Arc<dyn CloudRelay>,
        registry: Arc<PlatformRegistry>,
        event_timeout: Duration,
    ) -> Self {
        let subscriber =
            EventSubscriber::new(relay, device.clone()).with_default_timeout(event_timeout);
        Self {
            device,
            subscriber,
            registry,
        }
    }

    /// The platform registry for this run.
    #[must_use]
    pub fn registry(&self) -> &PlatformRegistry {
        &self.registry
    }

    /// Waits for the next event named `event_name` from the bound device.
    ///
    /// # Errors
    ///
    /// Returns [`crate::HarnessError::SubscriptionTimeout`] if no matching
    /// event arrives within the configured timeout.
    pub async fn receive_event(&self, event_name: &str) -> Result<EventRecord> {
        self.subscriber.await_event(event_name).await
    }

    /// Waits for the next event named `event_name`, bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::HarnessError::SubscriptionTimeout`] if no matching
    /// event arrives within `timeout`.
    pub async fn receive_event_with_timeout(
        &self,
        event_name: &str,
        timeout: Duration,
    ) -> Result<EventRecord> {
        self.subscriber
            .await_event_with_timeout(event_name, timeout)
            .await
    }

    /// Asserts that a received payload equals the truncation-policy
    /// expectation for `source` on the bound device's platform.
    ///
    /// # Errors
    ///
    /// Returns [`crate::HarnessError::AssertionMismatch`] with the full
    /// expected/actual diff when the payload differs.
    pub fn assert_event_data(&self, source: &str, received: &str) -> Result<()> {
        limits::assert_event_data(&self.device.platform, &self.registry, source, received)
    }

    /// The truncation-policy expectation for `source` given a payload of
    /// `observed_length` on the bound device's platform.
    #[must_use]
    pub fn expected_event_data<'a>(&self, observed_length: usize, source: &'a str) -> &'a str {
        limits::expected_event_data(&self.device.platform, &self.registry, observed_length, source)
    }
}
