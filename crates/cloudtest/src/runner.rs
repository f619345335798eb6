//! Test case execution
//!
//! Runs one (case, device) pair: enforces the applicability filter, executes
//! the body on its own task so a panic cannot take sibling cases down, and
//! converts errors into reported outcomes. This is the only place an error
//! becomes an outcome.

use crate::config::DriverConfig;
use crate::context::TestContext;
use crate::device::DeviceHandle;
use crate::error::HarnessError;
use crate::platform::PlatformRegistry;
use crate::relay::CloudRelay;
use crate::report::{CaseReport, FailureKind, Outcome, SkipReason};
use crate::suite::TestCase;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Executes one case against one bound device and reports the outcome.
pub async fn run_case(
    case: &TestCase,
    device: &DeviceHandle,
    relay: &Arc<dyn CloudRelay>,
    registry: &Arc<PlatformRegistry>,
    config: &DriverConfig,
) -> CaseReport {
    let platform_id = device.platform.id.to_string();

    if !case.applies_to(&device.platform) {
        debug!(case = case.name(), platform = %platform_id, "skipping non-applicable case");
        return CaseReport {
            case_name: case.name().to_string(),
            platform: platform_id.clone(),
            outcome: Outcome::Skipped(SkipReason::NotApplicable {
                platform: platform_id,
            }),
            attempts: 0,
            elapsed: std::time::Duration::ZERO,
        };
    }

    info!(case = case.name(), device = %device.id, platform = %platform_id, "running case");
    let started = Instant::now();
    let mut attempts = 0u32;

    let outcome = loop {
        attempts += 1;
        let context = TestContext::new(
            device.clone(),
            relay.clone(),
            registry.clone(),
            config.event_timeout,
        );

        // The body runs on its own task so an assertion panic inside it is
        // contained to this case.
        let handle = tokio::spawn((case.body())(context));
        let result = match handle.await {
            Ok(result) => result,
            Err(join_error) => {
                let message = if join_error.is_panic() {
                    format!("test body panicked: {}", panic_message(join_error.into_panic()))
                } else {
                    "test body was cancelled".to_string()
                };
                break Outcome::Failed(FailureKind::Harness { message });
            }
        };

        match result {
            Ok(()) => break Outcome::Passed,
            Err(error) => {
                if error.is_transient() && config.retry.should_retry(attempts) {
                    let delay = config.retry.delay(attempts);
                    warn!(
                        case = case.name(),
                        device = %device.id,
                        attempt = attempts,
                        ?delay,
                        %error,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                break Outcome::Failed(FailureKind::from(error));
            }
        }
    };

    let elapsed = started.elapsed();
    match &outcome {
        Outcome::Passed => info!(case = case.name(), platform = %platform_id, "case passed"),
        Outcome::Failed(kind) => {
            warn!(case = case.name(), platform = %platform_id, ?kind, "case failed");
        }
        Outcome::Skipped(_) => {}
    }

    CaseReport {
        case_name: case.name().to_string(),
        platform: platform_id,
        outcome,
        attempts,
        elapsed,
    }
}

/// Builds the failure reports for a case list that could not be executed at
/// all (unknown platform tag, provisioning failure).
pub(crate) fn failed_reports(
    cases: &[TestCase],
    platform: &str,
    error: &HarnessError,
) -> Vec<CaseReport> {
    cases
        .iter()
        .map(|case| CaseReport {
            case_name: case.name().to_string(),
            platform: platform.to_string(),
            outcome: Outcome::Failed(FailureKind::from(error.clone())),
            attempts: 0,
            elapsed: std::time::Duration::ZERO,
        })
        .collect()
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
