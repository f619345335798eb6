//! Provisioned test devices
//!
//! A [`DeviceHandle`] represents one physical or virtual device bound to a
//! test run. Handles come from a [`DeviceProvisioner`], an external
//! collaborator the harness only talks to through this trait.

use crate::error::Result;
use crate::platform::PlatformCapabilities;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// One provisioned test device. Read-only for the duration of a test case.
#[derive(Debug, Clone)]
pub struct DeviceHandle {
    pub id: Arc<str>,
    pub platform: Arc<PlatformCapabilities>,
}

impl DeviceHandle {
    #[must_use]
    pub fn new(id: impl Into<Arc<str>>, platform: Arc<PlatformCapabilities>) -> Self {
        Self {
            id: id.into(),
            platform,
        }
    }
}

/// Device provisioning service.
///
/// `provision` yields a device satisfying a platform constraint (a platform
/// id, family, or generation tag); `release` returns it to the pool at suite
/// teardown. The suite driver owns handle lifecycle and releases every
/// provisioned device on every exit path.
pub trait DeviceProvisioner: Send + Sync {
    /// Provisions a device whose platform matches `constraint`.
    ///
    /// # Errors
    ///
    /// Returns an error if no device satisfying the constraint is available.
    fn provision<'a>(
        &'a self,
        constraint: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<DeviceHandle>> + Send + 'a>>;

    /// Releases a previously provisioned device back to the pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the device was not provisioned by this service.
    fn release<'a>(
        &'a self,
        device: DeviceHandle,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}
