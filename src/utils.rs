//! # Utility Functions and Helper Module
//!
//! Unit conversions and human-readable formatters shared by the aggregation
//! core, the results writer and the CLI.
//!
//! ## Usage Examples
//!
//! ```rust
//! use trace_aggregator::utils::*;
//!
//! assert_eq!(ns_to_s(1_500_000_000), 1.5);
//! assert_eq!(us_to_ns(2_000), 2_000_000);
//! assert_eq!(format_duration_ns(1_500_000), "1.50ms");
//! assert_eq!(format_rate(2_500.0), "2.50 kops/s");
//! assert_eq!(join_numbers(&[1, 2, 3]), "1,2,3");
//! ```

use std::fmt::Display;

pub const NANOS_PER_SECOND: f64 = 1_000_000_000.0;
pub const NANOS_PER_MILLI: f64 = 1_000_000.0;

/// Convert nanoseconds to fractional seconds
pub fn ns_to_s(ns: u64) -> f64 {
    ns as f64 / NANOS_PER_SECOND
}

/// Convert microseconds to nanoseconds, saturating on overflow
pub fn us_to_ns(us: u64) -> u64 {
    us.saturating_mul(1_000)
}

/// Convert a nanosecond value to a human-readable duration string
///
/// The unit is picked so the integer part stays small:
/// - `< 1μs`: nanoseconds, no decimals
/// - `< 1ms`: microseconds with 2 decimals
/// - `< 1s`: milliseconds with 2 decimals
/// - otherwise seconds with 2 decimals
pub fn format_duration_ns(ns: u64) -> String {
    if ns < 1_000 {
        format!("{}ns", ns)
    } else if ns < 1_000_000 {
        format!("{:.2}μs", ns as f64 / 1_000.0)
    } else if ns < 1_000_000_000 {
        format!("{:.2}ms", ns as f64 / NANOS_PER_MILLI)
    } else {
        format!("{:.2}s", ns as f64 / NANOS_PER_SECOND)
    }
}

/// Format an operation rate with a decimal (1000-based) prefix
pub fn format_rate(ops_per_second: f64) -> String {
    if ops_per_second < 1_000.0 {
        format!("{:.2} ops/s", ops_per_second)
    } else if ops_per_second < 1_000_000.0 {
        format!("{:.2} kops/s", ops_per_second / 1_000.0)
    } else {
        format!("{:.2} Mops/s", ops_per_second / 1_000_000.0)
    }
}

/// Join numbers into a comma-separated list without spaces
pub fn join_numbers<T: Display>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_conversions() {
        assert_eq!(ns_to_s(500_000_000), 0.5);
        assert_eq!(us_to_ns(7), 7_000);
        assert_eq!(us_to_ns(u64::MAX), u64::MAX);
    }

    #[test]
    fn test_format_duration_ns() {
        assert_eq!(format_duration_ns(500), "500ns");
        assert_eq!(format_duration_ns(1_500), "1.50μs");
        assert_eq!(format_duration_ns(1_500_000), "1.50ms");
        assert_eq!(format_duration_ns(1_500_000_000), "1.50s");
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(500.0), "500.00 ops/s");
        assert_eq!(format_rate(1_500.0), "1.50 kops/s");
        assert_eq!(format_rate(2_500_000.0), "2.50 Mops/s");
    }

    #[test]
    fn test_join_numbers() {
        assert_eq!(join_numbers(&[4.0, 4.5]), "4,4.5");
        assert_eq!(join_numbers::<u64>(&[]), "");
    }
}
