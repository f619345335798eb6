//! In-process test doubles for the harness's external collaborators
//!
//! [`LocalRelay`] is a memory-backed cloud relay; [`StaticProvisioner`] hands
//! out a fixed table of virtual devices. Each test should create its own pair
//! to ensure isolation.

use crate::device::{DeviceHandle, DeviceProvisioner};
use crate::error::{HarnessError, Result};
use crate::limits;
use crate::platform::PlatformCapabilities;
use crate::relay::{CloudRelay, EventRecord, EventSubscription};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;
use ulid::Ulid;

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

struct SubscriptionEntry {
    device_id: Arc<str>,
    sender: flume::Sender<EventRecord>,
}

/// In-memory cloud relay.
///
/// Events published for a device are fanned out, in arrival order, to every
/// subscription open for that device at publish time. A per-device publish
/// limit can be set so a virtual device exhibits its platform's truncation
/// (or a stricter, empirically observed one).
pub struct LocalRelay {
    subscriptions: Arc<Mutex<HashMap<String, SubscriptionEntry>>>,
    device_limits: Mutex<HashMap<String, usize>>,
    channel_capacity: usize,
}

impl LocalRelay {
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
            device_limits: Mutex::new(HashMap::new()),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Overrides the per-subscription delivery buffer size.
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Caps the event data length published by a virtual device, emulating
    /// on-device truncation before publish.
    pub fn set_device_limit(&self, device_id: &str, limit: usize) {
        self.device_limits
            .lock()
            .insert(device_id.to_string(), limit);
    }

    /// Publishes an event as if `device_id` had sent it, applying the
    /// device's publish limit if one is set.
    pub fn publish(&self, device_id: &str, event_name: &str, data: &str) {
        let data = match self.device_limits.lock().get(device_id) {
            Some(&limit) => limits::prefix(data, limit).to_string(),
            None => data.to_string(),
        };
        let record = EventRecord {
            name: event_name.to_string(),
            data,
            received_at: SystemTime::now(),
        };

        let subscriptions = self.subscriptions.lock();
        for (id, entry) in subscriptions.iter() {
            if entry.device_id.as_ref() == device_id {
                if entry.sender.try_send(record.clone()).is_err() {
                    debug!(subscription = %id, "delivery channel full, dropping event");
                }
            }
        }
    }

    /// Number of currently open subscriptions, for leak assertions.
    #[must_use]
    pub fn open_subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }
}

impl Default for LocalRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl CloudRelay for LocalRelay {
    fn open_subscription<'a>(
        &'a self,
        device: &'a DeviceHandle,
    ) -> Pin<Box<dyn Future<Output = Result<EventSubscription>> + Send + 'a>> {
        Box::pin(async move {
            let id = format!("sub-{}", Ulid::new());
            let (sender, receiver) = flume::bounded(self.channel_capacity);
            self.subscriptions.lock().insert(
                id.clone(),
                SubscriptionEntry {
                    device_id: device.id.clone(),
                    sender,
                },
            );
            debug!(subscription = %id, device = %device.id, "subscription opened");

            let subscriptions = self.subscriptions.clone();
            let close_id = id.clone();
            let on_close = Box::new(move || {
                subscriptions.lock().remove(&close_id);
            });
            Ok(EventSubscription::new(id, receiver, on_close))
        })
    }
}

struct PooledDevice {
    handle: DeviceHandle,
    in_use: bool,
}

/// Device provisioner backed by a fixed table of virtual devices.
pub struct StaticProvisioner {
    pool: Mutex<Vec<PooledDevice>>,
    released: Mutex<Vec<Arc<str>>>,
}

impl StaticProvisioner {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pool: Mutex::new(Vec::new()),
            released: Mutex::new(Vec::new()),
        }
    }

    /// Adds a virtual device to the pool.
    #[must_use]
    pub fn with_device(
        self,
        id: impl Into<Arc<str>>,
        platform: Arc<PlatformCapabilities>,
    ) -> Self {
        self.pool.lock().push(PooledDevice {
            handle: DeviceHandle::new(id, platform),
            in_use: false,
        });
        self
    }

    /// Ids of devices released back to the pool, in release order.
    #[must_use]
    pub fn released_ids(&self) -> Vec<Arc<str>> {
        self.released.lock().clone()
    }

    /// Number of devices currently provisioned out.
    #[must_use]
    pub fn in_use_count(&self) -> usize {
        self.pool.lock().iter().filter(|d| d.in_use).count()
    }
}

impl Default for StaticProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceProvisioner for StaticProvisioner {
    fn provision<'a>(
        &'a self,
        constraint: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<DeviceHandle>> + Send + 'a>> {
        Box::pin(async move {
            let mut pool = self.pool.lock();
            let slot = pool
                .iter_mut()
                .find(|d| !d.in_use && d.handle.platform.is(constraint));
            match slot {
                Some(slot) => {
                    slot.in_use = true;
                    Ok(slot.handle.clone())
                }
                None => Err(HarnessError::Provisioning(format!(
                    "no available device for platform constraint '{constraint}'"
                ))),
            }
        })
    }

    fn release<'a>(
        &'a self,
        device: DeviceHandle,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut pool = self.pool.lock();
            let slot = pool
                .iter_mut()
                .find(|d| d.in_use && d.handle.id == device.id);
            match slot {
                Some(slot) => {
                    slot.in_use = false;
                    drop(pool);
                    self.released.lock().push(device.id);
                    Ok(())
                }
                None => Err(HarnessError::Provisioning(format!(
                    "device '{}' was not provisioned here",
                    device.id
                ))),
            }
        })
    }
}

/// Generates a unique device id with the given prefix using a ULID suffix.
#[must_use]
pub fn unique_device_id(prefix: &str) -> String {
    format!("dev-{prefix}-{}", Ulid::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformRegistry;

    fn device(registry: &PlatformRegistry, platform_id: &str) -> DeviceHandle {
        DeviceHandle::new(
            unique_device_id(platform_id),
            registry.capabilities_for(platform_id).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_publish_fans_out_to_device_subscribers_only() {
        let registry = PlatformRegistry::builtin();
        let relay = LocalRelay::new();
        let boron = device(&registry, "boron");
        let argon = device(&registry, "argon");

        let boron_sub = relay.open_subscription(&boron).await.unwrap();
        let argon_sub = relay.open_subscription(&argon).await.unwrap();

        relay.publish(&boron.id, "my_event", "event data");

        let record = boron_sub.recv().await.unwrap();
        assert_eq!(record.name, "my_event");
        assert_eq!(record.data, "event data");

        relay.publish(&argon.id, "other", "x");
        let record = argon_sub.recv().await.unwrap();
        assert_eq!(record.name, "other");
    }

    #[tokio::test]
    async fn test_device_limit_truncates_publishes() {
        let registry = PlatformRegistry::builtin();
        let relay = LocalRelay::new();
        let boron = device(&registry, "boron");
        relay.set_device_limit(&boron.id, 5);

        let subscription = relay.open_subscription(&boron).await.unwrap();
        relay.publish(&boron.id, "my_event", "event data");

        let record = subscription.recv().await.unwrap();
        assert_eq!(record.data, "event");
    }

    #[tokio::test]
    async fn test_dropping_subscription_releases_it() {
        let registry = PlatformRegistry::builtin();
        let relay = LocalRelay::new();
        let boron = device(&registry, "boron");

        let subscription = relay.open_subscription(&boron).await.unwrap();
        assert_eq!(relay.open_subscription_count(), 1);
        drop(subscription);
        assert_eq!(relay.open_subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_provisioner_pool_discipline() {
        let registry = PlatformRegistry::builtin();
        let provisioner = StaticProvisioner::new()
            .with_device("d1", registry.capabilities_for("boron").unwrap())
            .with_device("d2", registry.capabilities_for("photon").unwrap());

        let boron = provisioner.provision("gen3").await.unwrap();
        assert_eq!(&*boron.id, "d1");
        assert_eq!(provisioner.in_use_count(), 1);

        // Only d2 remains, and it is not gen3.
        assert!(provisioner.provision("gen3").await.is_err());

        provisioner.release(boron).await.unwrap();
        assert_eq!(provisioner.in_use_count(), 0);
        assert_eq!(provisioner.released_ids(), [Arc::<str>::from("d1")]);

        // Released devices can be provisioned again.
        assert!(provisioner.provision("boron").await.is_ok());
    }

    #[tokio::test]
    async fn test_release_of_unknown_device_is_an_error() {
        let registry = PlatformRegistry::builtin();
        let provisioner = StaticProvisioner::new();
        let stray = device(&registry, "argon");
        assert!(provisioner.release(stray).await.is_err());
    }
}
