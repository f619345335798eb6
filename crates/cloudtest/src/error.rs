use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HarnessError>;

#[derive(Debug, Clone, Error)]
pub enum HarnessError {
    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("No event '{event}' received within {waited:?}")]
    SubscriptionTimeout { event: String, waited: Duration },

    #[error(
        "Event data mismatch: expected {} chars, got {} chars\n  expected: {expected:?}\n  actual:   {actual:?}",
        .expected.chars().count(),
        .actual.chars().count()
    )]
    AssertionMismatch { expected: String, actual: String },

    #[error("Invalid platform capabilities: {0}")]
    InvalidCapabilities(String),

    #[error("Provisioning error: {0}")]
    Provisioning(String),

    #[error("Relay error: {0}")]
    Relay(String),

    #[error("Suite configuration error: {0}")]
    SuiteConfig(String),
}

impl HarnessError {
    /// Whether this error represents a transient infrastructure condition
    /// eligible for a driver-level retry, as opposed to a logic or
    /// configuration defect.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::SubscriptionTimeout { .. })
    }
}
