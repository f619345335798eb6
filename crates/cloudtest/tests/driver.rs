//! Suite driver behavior: case isolation, per-device ordering, resource
//! discipline, retry policy, and failure categorization.

use cloudtest::testing::{unique_device_id, LocalRelay, StaticProvisioner};
use cloudtest::{
    DriverConfig, FailureKind, HarnessError, Outcome, PlatformRegistry, RetryConfig, SkipReason,
    Suite, SuiteDriver,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn driver_for(
    platform_ids: &[&str],
) -> (SuiteDriver, Arc<StaticProvisioner>, Arc<LocalRelay>) {
    let registry = Arc::new(PlatformRegistry::builtin());
    let mut provisioner = StaticProvisioner::new();
    for platform_id in platform_ids {
        provisioner = provisioner.with_device(
            unique_device_id(platform_id),
            registry.capabilities_for(platform_id).unwrap(),
        );
    }
    let provisioner = Arc::new(provisioner);
    let relay = Arc::new(LocalRelay::new());
    let driver = SuiteDriver::new(registry, provisioner.clone(), relay.clone()).with_config(
        DriverConfig::default().with_event_timeout(Duration::from_millis(50)),
    );
    (driver, provisioner, relay)
}

fn case_outcome<'a>(
    report: &'a cloudtest::SuiteReport,
    case_name: &str,
    platform: &str,
) -> &'a Outcome {
    &report
        .cases
        .iter()
        .find(|c| c.case_name == case_name && c.platform == platform)
        .unwrap_or_else(|| panic!("no report for {case_name} on {platform}"))
        .outcome
}

#[tokio::test]
async fn test_failing_case_does_not_abort_siblings() {
    let (driver, _provisioner, _relay) = driver_for(&["photon", "argon"]);

    let suite = Suite::builder("isolation")
        .platform("photon")
        .platform("argon")
        .test("fails_on_gen2", |ctx| async move {
            if ctx.device.platform.is("gen2") {
                ctx.assert_event_data("expected", "actual")?;
            }
            Ok(())
        })
        .test("always_passes", |_ctx| async { Ok(()) })
        .build()
        .unwrap();

    let report = driver.run(&suite).await;

    assert!(case_outcome(&report, "fails_on_gen2", "photon").is_failed());
    assert!(case_outcome(&report, "always_passes", "photon").is_passed());
    assert!(case_outcome(&report, "fails_on_gen2", "argon").is_passed());
    assert!(case_outcome(&report, "always_passes", "argon").is_passed());
}

#[tokio::test]
async fn test_same_device_cases_run_in_declaration_order() {
    let (driver, _provisioner, _relay) = driver_for(&["photon"]);
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut builder = Suite::builder("ordering").platform("photon");
    for name in ["first", "second", "third"] {
        let order = order.clone();
        builder = builder.test(name, move |_ctx| {
            let order = order.clone();
            async move {
                order.lock().unwrap().push(name);
                Ok(())
            }
        });
    }
    let report = driver.run(&builder.build().unwrap()).await;

    assert!(report.is_success());
    assert_eq!(*order.lock().unwrap(), ["first", "second", "third"]);
}

#[tokio::test]
async fn test_no_subscription_leak_across_cases() {
    let (driver, _provisioner, relay) = driver_for(&["boron"]);

    let suite = Suite::builder("leaks")
        .platform("boron")
        .test("times_out", |ctx| async move {
            ctx.receive_event("never").await?;
            Ok(())
        })
        .test("passes", |_ctx| async { Ok(()) })
        .build()
        .unwrap();

    let report = driver.run(&suite).await;

    assert_eq!(report.failed_count(), 1);
    assert_eq!(report.passed_count(), 1);
    assert_eq!(relay.open_subscription_count(), 0);
}

#[tokio::test]
async fn test_timeout_reported_as_its_own_category() {
    let (driver, _provisioner, _relay) = driver_for(&["argon"]);

    let suite = Suite::builder("timeouts")
        .platform("argon")
        .test("no_event", |ctx| async move {
            let record = ctx.receive_event("my_event").await?;
            ctx.assert_event_data("event data", &record.data)?;
            Ok(())
        })
        .build()
        .unwrap();

    let report = driver.run(&suite).await;

    match case_outcome(&report, "no_event", "argon") {
        Outcome::Failed(FailureKind::Timeout { event, .. }) => assert_eq!(event, "my_event"),
        other => panic!("expected Timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_platform_tag_fails_without_stopping_the_run() {
    let (driver, _provisioner, _relay) = driver_for(&["photon"]);

    let suite = Suite::builder("unknown")
        .platform("duo")
        .platform("photon")
        .test("passes", |_ctx| async { Ok(()) })
        .build()
        .unwrap();

    let report = driver.run(&suite).await;

    match case_outcome(&report, "passes", "duo") {
        Outcome::Failed(FailureKind::Configuration { message }) => {
            assert!(message.contains("duo"), "{message}");
        }
        other => panic!("expected Configuration failure, got {other:?}"),
    }
    assert!(case_outcome(&report, "passes", "photon").is_passed());
}

#[tokio::test]
async fn test_provisioning_failure_is_a_harness_failure() {
    // The tag is registered but no pooled device satisfies it.
    let (driver, _provisioner, _relay) = driver_for(&["photon"]);

    let suite = Suite::builder("exhausted")
        .platform("boron")
        .test("needs_a_boron", |_ctx| async { Ok(()) })
        .build()
        .unwrap();

    let report = driver.run(&suite).await;

    match case_outcome(&report, "needs_a_boron", "boron") {
        Outcome::Failed(FailureKind::Harness { message }) => {
            assert!(message.contains("boron"), "{message}");
        }
        other => panic!("expected Harness failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_applicable_combination_is_skipped() {
    let (driver, _provisioner, _relay) = driver_for(&["photon", "boron"]);

    let suite = Suite::builder("filtered")
        .platform("photon")
        .platform("boron")
        .test_on(["bsom", "boron"], "cellular_only", |_ctx| async { Ok(()) })
        .build()
        .unwrap();

    let report = driver.run(&suite).await;

    match case_outcome(&report, "cellular_only", "photon") {
        Outcome::Skipped(SkipReason::NotApplicable { platform }) => {
            assert_eq!(platform, "photon");
        }
        other => panic!("expected skip, got {other:?}"),
    }
    assert!(case_outcome(&report, "cellular_only", "boron").is_passed());
    assert_eq!(report.skipped_count(), 1);
    assert_eq!(report.passed_count(), 1);
}

#[tokio::test]
async fn test_devices_released_at_teardown() {
    let (driver, provisioner, _relay) = driver_for(&["photon", "boron"]);

    let suite = Suite::builder("teardown")
        .platform("photon")
        .platform("boron")
        .test("fails_everywhere", |ctx| async move {
            Err(HarnessError::Relay(format!(
                "injected failure on {}",
                ctx.device.id
            )))
        })
        .build()
        .unwrap();

    let report = driver.run(&suite).await;

    // Devices go back to the pool even when every case failed.
    assert_eq!(report.failed_count(), 2);
    assert_eq!(provisioner.in_use_count(), 0);
    assert_eq!(provisioner.released_ids().len(), 2);
}

#[tokio::test]
async fn test_timeout_retry_can_rescue_a_flaky_case() {
    let registry = Arc::new(PlatformRegistry::builtin());
    let provisioner = Arc::new(StaticProvisioner::new().with_device(
        unique_device_id("boron"),
        registry.capabilities_for("boron").unwrap(),
    ));
    let relay = Arc::new(LocalRelay::new());
    let driver = SuiteDriver::new(registry, provisioner, relay).with_config(
        DriverConfig::default()
            .with_event_timeout(Duration::from_millis(30))
            .with_retry(RetryConfig {
                auto_retry: true,
                max_retries: 2,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
                backoff_factor: 2.0,
            }),
    );

    let attempts_seen = Arc::new(AtomicU32::new(0));
    let attempts_clone = attempts_seen.clone();
    let suite = Suite::builder("flaky")
        .platform("boron")
        .test("second_attempt_passes", move |ctx| {
            let attempts = attempts_clone.clone();
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    // First attempt: nothing published, so the wait times out.
                    ctx.receive_event("my_event").await?;
                }
                Ok(())
            }
        })
        .build()
        .unwrap();

    let report = driver.run(&suite).await;

    assert!(report.is_success(), "{}", report.generate_text());
    assert_eq!(report.cases[0].attempts, 2);
    assert_eq!(attempts_seen.load(Ordering::SeqCst), 2);
}
