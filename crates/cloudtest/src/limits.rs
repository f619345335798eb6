//! Event data truncation policy
//!
//! A device truncates event data to its platform's maximum length before
//! publish. Constrained cellular variants apply a stricter, transport-derived
//! limit, observable only as a shorter-than-nominal payload. The check order
//! matters: the family override is consulted first, and only then is the
//! observed length compared against the nominal maximum.

use crate::error::{HarnessError, Result};
use crate::platform::{PlatformCapabilities, PlatformRegistry};

/// Resolves the effective maximum event data length for a received payload.
///
/// Starts from the platform's nominal limit. If the platform's family has a
/// reduced-limit override registered and the observed payload is strictly
/// shorter than the nominal limit, the device is taken to be applying the
/// stricter transport-derived limit and the override value is returned. An
/// observed length equal to the nominal limit never triggers the reduction.
#[must_use]
pub fn effective_max_length(
    capabilities: &PlatformCapabilities,
    registry: &PlatformRegistry,
    observed_length: usize,
) -> usize {
    let max_len = capabilities.max_event_payload_length;
    if let Some(reduced) = registry.reduced_limit(capabilities.family) {
        if observed_length < max_len {
            return reduced;
        }
    }
    max_len
}

/// Returns the payload a device is expected to publish for `source`:
/// the prefix of the effective maximum length, or `source` unchanged when it
/// is already short enough.
#[must_use]
pub fn expected_event_data<'a>(
    capabilities: &PlatformCapabilities,
    registry: &PlatformRegistry,
    observed_length: usize,
    source: &'a str,
) -> &'a str {
    let max_len = effective_max_length(capabilities, registry, observed_length);
    prefix(source, max_len)
}

/// Asserts that a received payload equals the expected prefix of `source`.
///
/// # Errors
///
/// Returns [`HarnessError::AssertionMismatch`] carrying the full expected and
/// actual strings when they differ.
pub fn assert_event_data(
    capabilities: &PlatformCapabilities,
    registry: &PlatformRegistry,
    source: &str,
    received: &str,
) -> Result<()> {
    let expected = expected_event_data(capabilities, registry, received.len(), source);
    if received == expected {
        Ok(())
    } else {
        Err(HarnessError::AssertionMismatch {
            expected: expected.to_string(),
            actual: received.to_string(),
        })
    }
}

/// The longest prefix of `s` that fits in `max_len` bytes without splitting a
/// character. Devices truncate at byte boundaries; a cut inside a multi-byte
/// sequence could not have survived as valid payload text anyway.
pub(crate) fn prefix(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
