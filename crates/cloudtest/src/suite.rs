//! Suite declaration and execution
//!
//! Suites are declared through a builder and frozen into an immutable case
//! list before execution begins. The driver provisions one device per target
//! platform, runs each device's cases strictly in declaration order, and
//! lets different devices proceed in parallel.

use crate::config::DriverConfig;
use crate::context::TestContext;
use crate::device::DeviceProvisioner;
use crate::error::{HarnessError, Result};
use crate::platform::{PlatformCapabilities, PlatformRegistry};
use crate::relay::CloudRelay;
use crate::report::{CaseReport, SuiteReport};
use crate::runner::{failed_reports, run_case};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Async test body: takes the injected context, returns pass/fail.
pub type TestBody =
    Arc<dyn Fn(TestContext) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync>;

/// One declared test case. Immutable after suite build.
#[derive(Clone)]
pub struct TestCase {
    name: String,
    applicable_platforms: Vec<String>,
    body: TestBody,
}

impl TestCase {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Applicability tags (platform ids, families, or generations).
    #[must_use]
    pub fn applicable_platforms(&self) -> &[String] {
        &self.applicable_platforms
    }

    /// Whether this case applies to a platform.
    #[must_use]
    pub fn applies_to(&self, platform: &PlatformCapabilities) -> bool {
        self.applicable_platforms.iter().any(|tag| platform.is(tag))
    }

    pub(crate) fn body(&self) -> TestBody {
        self.body.clone()
    }
}

impl std::fmt::Debug for TestCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("applicable_platforms", &self.applicable_platforms)
            .finish_non_exhaustive()
    }
}

/// An immutable group of test cases targeting a set of platforms.
#[derive(Debug, Clone)]
pub struct Suite {
    name: String,
    platforms: Vec<String>,
    cases: Vec<TestCase>,
}

impl Suite {
    /// Starts declaring a suite.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> SuiteBuilder {
        SuiteBuilder {
            name: name.into(),
            platforms: Vec::new(),
            cases: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared target platform tags, in declaration order.
    #[must_use]
    pub fn platforms(&self) -> &[String] {
        &self.platforms
    }

    #[must_use]
    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }
}

/// Declarative registration surface: `suite → platform(...) → test(...)`,
/// compiled into an immutable [`Suite`] by [`build`](Self::build).
pub struct SuiteBuilder {
    name: String,
    platforms: Vec<String>,
    cases: Vec<TestCase>,
}

impl SuiteBuilder {
    /// Adds a target platform tag (platform id, family, or generation).
    #[must_use]
    pub fn platform(mut self, tag: impl Into<String>) -> Self {
        self.platforms.push(tag.into());
        self
    }

    /// Adds several target platform tags.
    #[must_use]
    pub fn platforms<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.platforms.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Declares a test case applicable to every suite platform.
    #[must_use]
    pub fn test<F, Fut>(self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(TestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.case(name, Vec::new(), body)
    }

    /// Declares a test case restricted to a subset of platform tags.
    #[must_use]
    pub fn test_on<I, S, F, Fut>(self, platforms: I, name: impl Into<String>, body: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(TestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let platforms: Vec<String> = platforms.into_iter().map(Into::into).collect();
        self.case(name, platforms, body)
    }

    fn case<F, Fut>(mut self, name: impl Into<String>, platforms: Vec<String>, body: F) -> Self
    where
        F: Fn(TestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let body: TestBody = Arc::new(move |context| Box::pin(body(context)));
        self.cases.push(TestCase {
            name: name.into(),
            applicable_platforms: platforms,
            body,
        });
        self
    }

    /// Freezes the declaration into an immutable [`Suite`].
    ///
    /// Cases declared without their own platform list inherit the suite's
    /// platforms.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::SuiteConfig`] if the suite name is empty, no
    /// platform was declared, or two cases share a name.
    pub fn build(mut self) -> Result<Suite> {
        if self.name.trim().is_empty() {
            return Err(HarnessError::SuiteConfig("suite name is empty".to_string()));
        }
        if self.platforms.is_empty() {
            return Err(HarnessError::SuiteConfig(format!(
                "suite '{}' declares no target platforms",
                self.name
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for case in &self.cases {
            if !seen.insert(case.name.clone()) {
                return Err(HarnessError::SuiteConfig(format!(
                    "duplicate test case name '{}'",
                    case.name
                )));
            }
        }
        for case in &mut self.cases {
            if case.applicable_platforms.is_empty() {
                case.applicable_platforms = self.platforms.clone();
            }
        }
        Ok(Suite {
            name: self.name,
            platforms: self.platforms,
            cases: self.cases,
        })
    }
}

/// Executes suites against provisioned devices.
pub struct SuiteDriver {
    registry: Arc<PlatformRegistry>,
    provisioner: Arc<dyn DeviceProvisioner>,
    relay: Arc<dyn CloudRelay>,
    config: DriverConfig,
}

impl SuiteDriver {
    #[must_use]
    pub fn new(
        registry: Arc<PlatformRegistry>,
        provisioner: Arc<dyn DeviceProvisioner>,
        relay: Arc<dyn CloudRelay>,
    ) -> Self {
        Self {
            registry,
            provisioner,
            relay,
            config: DriverConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs every (case × platform) pair of the suite and aggregates a
    /// report.
    ///
    /// One device is provisioned per declared platform tag and released at
    /// teardown. Cases bound to the same device run strictly in declaration
    /// order; devices proceed in parallel up to the configured limit. A
    /// failing case never aborts its siblings.
    pub async fn run(&self, suite: &Suite) -> SuiteReport {
        info!(suite = suite.name(), platforms = ?suite.platforms(), "starting suite");

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_devices));
        let mut join_set: JoinSet<(usize, Vec<CaseReport>)> = JoinSet::new();
        let mut slots: Vec<Vec<CaseReport>> = Vec::new();

        for (index, tag) in suite.platforms().iter().enumerate() {
            slots.push(Vec::new());

            if self.registry.matching(tag).is_empty() {
                let error = HarnessError::UnknownPlatform(tag.clone());
                warn!(platform = %tag, "declared platform is not registered");
                slots[index] = failed_reports(suite.cases(), tag, &error);
                continue;
            }

            let tag = tag.clone();
            let cases = suite.cases().to_vec();
            let registry = self.registry.clone();
            let provisioner = self.provisioner.clone();
            let relay = self.relay.clone();
            let config = self.config.clone();
            let semaphore = semaphore.clone();

            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();

                let device = match provisioner.provision(&tag).await {
                    Ok(device) => device,
                    Err(error) => {
                        warn!(platform = %tag, %error, "provisioning failed");
                        return (index, failed_reports(&cases, &tag, &error));
                    }
                };
                info!(device = %device.id, platform = %device.platform.id, "provisioned device");

                let mut reports = Vec::with_capacity(cases.len());
                for case in &cases {
                    reports.push(run_case(case, &device, &relay, &registry, &config).await);
                }

                if let Err(error) = provisioner.release(device.clone()).await {
                    warn!(device = %device.id, %error, "device release failed");
                }

                (index, reports)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, reports)) => slots[index] = reports,
                Err(join_error) => warn!(%join_error, "device task failed to complete"),
            }
        }

        let report = SuiteReport {
            suite_name: suite.name().to_string(),
            cases: slots.into_iter().flatten().collect(),
        };
        info!(
            suite = suite.name(),
            passed = report.passed_count(),
            failed = report.failed_count(),
            skipped = report.skipped_count(),
            "suite finished"
        );
        report
    }
}
