//! Shared utilization and allocation arithmetic.
//!
//! Pod and Node sanitizers compare one observed amount against one
//! limit with a single percentage threshold. Deployment and StatefulSet
//! sanitizers run the two-sided allocation check: total requested
//! resources (per-pod request times replica count) against total
//! observed usage across the workload's pods.

use crate::config::AllocationLimits;
use crate::issues::{Issue, Severity};

/// Rounded percentage of `current` over `requested`.
///
/// Returns 0 when `requested` is zero; callers must gate on non-zero
/// requested amounts before reading meaning into the result.
pub fn ratio(requested: u64, current: u64) -> u32 {
    if requested == 0 {
        return 0;
    }
    ((current as f64 / requested as f64) * 100.0).round() as u32
}

/// One-sided check: observed usage against a limit, flagged when the
/// percentage exceeds the configured threshold. No issue when the limit
/// is absent (zero).
pub fn check_threshold(metric: &str, current: u64, limit: u64, threshold: u32) -> Option<Issue> {
    if limit == 0 {
        return None;
    }
    let pct = ratio(limit, current);
    if pct > threshold {
        Some(Issue::new(
            Severity::Warn,
            format!(
                "{} usage at {}% of limit, threshold is {}%",
                metric, pct, threshold
            ),
        ))
    } else {
        None
    }
}

/// Two-sided workload allocation check.
///
/// Skipped entirely when nothing was requested. Flags over-allocation
/// when the usage ratio climbs past `over_percent` and under-allocation
/// when it sits strictly between zero and `under_percent`.
pub fn check_allocation(
    metric: &str,
    requested: u64,
    current: u64,
    limits: AllocationLimits,
) -> Option<Issue> {
    if requested == 0 {
        return None;
    }
    let pct = ratio(requested, current);
    if pct > limits.over_percent {
        Some(Issue::new(
            Severity::Warn,
            format!(
                "{} over allocated, current usage at {}% of requested",
                metric, pct
            ),
        ))
    } else if pct > 0 && pct < limits.under_percent {
        Some(Issue::new(
            Severity::Warn,
            format!(
                "{} under allocated, current usage at {}% of requested",
                metric, pct
            ),
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_rounds() {
        assert_eq!(ratio(1000, 500), 50);
        assert_eq!(ratio(3, 1), 33);
        assert_eq!(ratio(3, 2), 67);
        assert_eq!(ratio(0, 500), 0);
    }

    #[test]
    fn threshold_flags_only_above() {
        assert!(check_threshold("CPU", 900, 1000, 80).is_some());
        assert!(check_threshold("CPU", 800, 1000, 80).is_none());
        assert!(check_threshold("CPU", 900, 0, 80).is_none());
    }

    #[test]
    fn allocation_skips_zero_request() {
        let limits = AllocationLimits::default();
        assert!(check_allocation("CPU", 0, 500, limits).is_none());
    }

    #[test]
    fn allocation_two_sided() {
        let limits = AllocationLimits {
            under_percent: 50,
            over_percent: 100,
        };
        let over = check_allocation("CPU", 1000, 1500, limits).unwrap();
        assert!(over.message.contains("over allocated"));

        let under = check_allocation("MEM", 1000, 200, limits).unwrap();
        assert!(under.message.contains("under allocated"));

        // Zero usage is not "under allocated": likely just no metrics.
        assert!(check_allocation("CPU", 1000, 0, limits).is_none());
        // In band.
        assert!(check_allocation("CPU", 1000, 700, limits).is_none());
    }
}
