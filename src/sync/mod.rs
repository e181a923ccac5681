//! Per-kind synchronizers
//!
//! Each synchronizer brings one resource to its desired state on a single
//! instance and returns the identifier that instance assigned. They never
//! swallow errors and never touch status; aggregation is the controller's job.

mod authorization;
mod bucket;
mod organization;

use tracing::warn;

use crate::influx::RetentionRule;

pub use authorization::{AuthorizationSync, SyncFailure};
pub use bucket::sync_bucket;
pub use organization::sync_organization;

/// Units accepted in a retention policy
const RETENTION_UNITS: &[&str] = &["ns", "us", "µs", "μs", "ms", "s", "m", "h"];

/// Parse a retention policy such as `720h` or `1h30m` into an expiry rule
///
/// Policies are sequences of decimal numbers each followed by one of
/// [`RETENTION_UNITS`] with no separators; a bare `0` is also accepted.
/// Returns `None` for an empty or unparsable policy, which leaves the bucket
/// with infinite retention.
pub fn parse_retention(policy: &str) -> Option<RetentionRule> {
    let policy = policy.trim();
    if policy.is_empty() {
        return None;
    }
    if !has_retention_units(policy) {
        warn!(policy = %policy, "ignoring retention policy with unsupported units");
        return None;
    }

    match humantime::parse_duration(policy) {
        Ok(duration) => i64::try_from(duration.as_secs())
            .ok()
            .map(RetentionRule::expire),
        Err(e) => {
            warn!(policy = %policy, error = %e, "ignoring unparsable retention policy");
            None
        }
    }
}

/// Whether `policy` is a run of `<number><unit>` segments with known units
fn has_retention_units(policy: &str) -> bool {
    if policy == "0" {
        return true;
    }

    let mut rest = policy;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_end == 0 {
            return false;
        }
        rest = &rest[number_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        if !RETENTION_UNITS.contains(&&rest[..unit_end]) {
            return false;
        }
        rest = &rest[unit_end..];
    }
    true
}
