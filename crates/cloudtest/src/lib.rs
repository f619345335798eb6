//! # Device Cloud Event Test Harness
//!
//! An orchestration harness for integration-testing cloud event publishing
//! from real or virtual devices. A suite declares its target platforms and a
//! set of async test bodies; the driver binds a provisioned device and an
//! event subscriber to each body, filters cases by platform applicability,
//! and aggregates pass/fail/skip outcomes into a report.
//!
//! The harness consumes three external collaborators through traits: a
//! device provisioning service ([`DeviceProvisioner`]), a cloud relay that
//! pushes named event records ([`CloudRelay`]), and the firmware under test,
//! which is only ever observed through the events it publishes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cloudtest::testing::{unique_device_id, LocalRelay, StaticProvisioner};
//! use cloudtest::{PlatformRegistry, Suite, SuiteDriver};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> cloudtest::Result<()> {
//!     let registry = Arc::new(PlatformRegistry::builtin());
//!     let provisioner = Arc::new(
//!         StaticProvisioner::new()
//!             .with_device(unique_device_id("photon"), registry.capabilities_for("photon")?)
//!             .with_device(unique_device_id("boron"), registry.capabilities_for("boron")?),
//!     );
//!     let relay = Arc::new(LocalRelay::new());
//!
//!     let suite = Suite::builder("Cloud events")
//!         .platform("gen2")
//!         .platform("gen3")
//!         .test("publishes_an_event", |ctx| async move {
//!             let record = ctx.receive_event("my_event").await?;
//!             ctx.assert_event_data("event data", &record.data)?;
//!             Ok(())
//!         })
//!         .build()?;
//!
//!     let driver = SuiteDriver::new(registry, provisioner, relay);
//!     let report = driver.run(&suite).await;
//!     println!("{}", report.generate_text());
//!     Ok(())
//! }
//! ```
//!
//! ## Truncation policy
//!
//! Devices truncate event data to their platform's maximum length before
//! publish (864 bytes on gen 2, 1024 on gen 3). Constrained cellular
//! variants apply a stricter transport-derived limit, detected by a
//! shorter-than-nominal payload; [`limits`] encodes the exact two-tier
//! expectation used by assertions.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod limits;
pub mod platform;
pub mod relay;
pub mod report;
pub mod runner;
pub mod subscriber;
pub mod suite;
pub mod testing;

pub use config::{DriverConfig, RetryConfig};
pub use context::TestContext;
pub use device::{DeviceHandle, DeviceProvisioner};
pub use error::{HarnessError, Result};
pub use platform::{
    Generation, PlatformCapabilities, PlatformFamily, PlatformRegistry,
    MAX_EVENT_DATA_LENGTH_GEN2, MAX_EVENT_DATA_LENGTH_GEN3, REDUCED_CELLULAR_EVENT_DATA_LENGTH,
};
pub use relay::{CloudRelay, EventRecord, EventSubscription};
pub use report::{CaseReport, FailureKind, Outcome, SkipReason, SuiteReport};
pub use runner::run_case;
pub use subscriber::{EventSubscriber, DEFAULT_EVENT_TIMEOUT};
pub use suite::{Suite, SuiteBuilder, SuiteDriver, TestBody, TestCase};
