//! Suite execution reports
//!
//! Per-case outcomes with a distinct category for every failure class, plus
//! human-readable text and machine-readable JSON rendering.

use crate::error::HarnessError;
use serde::Serialize;
use std::fmt::Write;
use std::time::Duration;

/// Why a case was skipped rather than executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The bound device's platform matches none of the case's applicability
    /// tags.
    NotApplicable { platform: String },
}

/// The category of a case failure. Payload-length mismatches and flaky
/// connectivity dominate in practice, so they are kept apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// Received event data differed from the expected prefix.
    Mismatch { expected: String, actual: String },

    /// No matching event arrived within the wait bound.
    Timeout {
        event: String,
        #[serde(with = "humantime_serde")]
        waited: Duration,
    },

    /// A configuration defect (unknown platform, invalid capability table).
    /// Fatal for the case, never retried.
    Configuration { message: String },

    /// The harness or a collaborator failed (provisioning, relay, panic).
    Harness { message: String },
}

impl From<HarnessError> for FailureKind {
    fn from(err: HarnessError) -> Self {
        match err {
            HarnessError::AssertionMismatch { expected, actual } => {
                Self::Mismatch { expected, actual }
            }
            HarnessError::SubscriptionTimeout { event, waited } => Self::Timeout { event, waited },
            HarnessError::UnknownPlatform(_) | HarnessError::InvalidCapabilities(_) => {
                Self::Configuration {
                    message: err.to_string(),
                }
            }
            HarnessError::Provisioning(_) | HarnessError::Relay(_) | HarnessError::SuiteConfig(_) => {
                Self::Harness {
                    message: err.to_string(),
                }
            }
        }
    }
}

/// Outcome of one (case, platform) execution. Pass or fail, never partial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed(FailureKind),
    Skipped(SkipReason),
}

impl Outcome {
    #[must_use]
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

/// Report for one executed (or skipped) case on one platform.
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub case_name: String,
    /// Resolved platform id, or the declared tag when resolution failed.
    pub platform: String,
    pub outcome: Outcome,
    /// Number of attempts made (0 for skipped cases).
    pub attempts: u32,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}

/// Aggregated report for one suite run.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub suite_name: String,
    pub cases: Vec<CaseReport>,
}

impl SuiteReport {
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.cases.iter().filter(|c| c.outcome.is_passed()).count()
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.cases.iter().filter(|c| c.outcome.is_failed()).count()
    }

    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.cases.iter().filter(|c| c.outcome.is_skipped()).count()
    }

    /// True when no case failed. Skips do not count against success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Generates a human-readable report with a status marker per case and
    /// expected/actual lengths called out for mismatches.
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.suite_name);
        out.push('\n');
        out.push_str(&"=".repeat(60));
        out.push('\n');
        let _ = writeln!(
            out,
            "{} passed, {} failed, {} skipped\n",
            self.passed_count(),
            self.failed_count(),
            self.skipped_count()
        );

        for case in &self.cases {
            let marker = match &case.outcome {
                Outcome::Passed => "[PASS]",
                Outcome::Failed(_) => "[FAIL]",
                Outcome::Skipped(_) => "[SKIP]",
            };
            let _ = writeln!(out, "{marker} {} ({})", case.case_name, case.platform);
            match &case.outcome {
                Outcome::Failed(FailureKind::Mismatch { expected, actual }) => {
                    let _ = writeln!(
                        out,
                        "       expected ({} chars): {}",
                        expected.chars().count(),
                        truncate(expected, 70)
                    );
                    let _ = writeln!(
                        out,
                        "       actual   ({} chars): {}",
                        actual.chars().count(),
                        truncate(actual, 70)
                    );
                }
                Outcome::Failed(FailureKind::Timeout { event, waited }) => {
                    let _ = writeln!(out, "       no event '{event}' within {waited:?}");
                }
                Outcome::Failed(
                    FailureKind::Configuration { message } | FailureKind::Harness { message },
                ) => {
                    let _ = writeln!(out, "       {message}");
                }
                Outcome::Skipped(SkipReason::NotApplicable { platform }) => {
                    let _ = writeln!(out, "       not applicable on {platform}");
                }
                Outcome::Passed => {}
            }
            if case.attempts > 1 {
                let _ = writeln!(out, "       ({} attempts)", case.attempts);
            }
        }
        out
    }

    /// Generates a machine-readable JSON representation of the report.
    ///
    /// # Panics
    ///
    /// Panics if serialization fails, which cannot happen for these types.
    #[must_use]
    pub fn generate_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("json serialization failed")
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_owned()
    } else {
        let mut result: String = s.chars().take(max).collect();
        result.push_str("...");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> SuiteReport {
        SuiteReport {
            suite_name: "Cloud events".to_string(),
            cases: vec![
                CaseReport {
                    case_name: "publish".to_string(),
                    platform: "photon".to_string(),
                    outcome: Outcome::Passed,
                    attempts: 1,
                    elapsed: Duration::from_millis(120),
                },
                CaseReport {
                    case_name: "max_event_data_size".to_string(),
                    platform: "boron".to_string(),
                    outcome: Outcome::Failed(FailureKind::Mismatch {
                        expected: "a".repeat(838),
                        actual: "a".repeat(820),
                    }),
                    attempts: 1,
                    elapsed: Duration::from_millis(450),
                },
                CaseReport {
                    case_name: "publish".to_string(),
                    platform: "tracker".to_string(),
                    outcome: Outcome::Skipped(SkipReason::NotApplicable {
                        platform: "tracker".to_string(),
                    }),
                    attempts: 0,
                    elapsed: Duration::ZERO,
                },
            ],
        }
    }

    #[test]
    fn test_counts() {
        let report = report();
        assert_eq!(report.passed_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.skipped_count(), 1);
        assert!(!report.is_success());
    }

    #[test]
    fn test_text_report_calls_out_lengths() {
        let text = report().generate_text();
        assert!(text.contains("1 passed, 1 failed, 1 skipped"));
        assert!(text.contains("[PASS] publish (photon)"));
        assert!(text.contains("[FAIL] max_event_data_size (boron)"));
        assert!(text.contains("expected (838 chars)"));
        assert!(text.contains("actual   (820 chars)"));
        assert!(text.contains("[SKIP] publish (tracker)"));
    }

    #[test]
    fn test_json_report() {
        let json = report().generate_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["suite_name"], "Cloud events");
        assert_eq!(value["cases"][0]["outcome"]["status"], "passed");
        assert_eq!(value["cases"][1]["outcome"]["detail"]["kind"], "mismatch");
        assert_eq!(
            value["cases"][2]["outcome"]["detail"]["reason"],
            "not_applicable"
        );
    }

    #[test]
    fn test_failure_kind_classification() {
        let kind: FailureKind = HarnessError::UnknownPlatform("duo".to_string()).into();
        assert!(matches!(kind, FailureKind::Configuration { .. }));

        let kind: FailureKind = HarnessError::SubscriptionTimeout {
            event: "e".to_string(),
            waited: Duration::from_secs(1),
        }
        .into();
        assert!(matches!(kind, FailureKind::Timeout { .. }));

        let kind: FailureKind = HarnessError::Provisioning("pool empty".to_string()).into();
        assert!(matches!(kind, FailureKind::Harness { .. }));
    }

    #[test]
    fn test_skips_do_not_fail_the_suite() {
        let report = SuiteReport {
            suite_name: "s".to_string(),
            cases: vec![CaseReport {
                case_name: "c".to_string(),
                platform: "p".to_string(),
                outcome: Outcome::Skipped(SkipReason::NotApplicable {
                    platform: "p".to_string(),
                }),
                attempts: 0,
                elapsed: Duration::ZERO,
            }],
        };
        assert!(report.is_success());
    }
}
