//! Wall-clock time as f64 seconds since the Unix epoch.
//!
//! Snapshot timestamps and report receipt times share this single notion of
//! "now" so that ordering comparisons are meaningful across producers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in seconds since the Unix epoch.
pub fn wall_clock_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_is_past_2020_and_monotone_enough() {
        let a = wall_clock_seconds();
        let b = wall_clock_seconds();
        assert!(a > 1_577_836_800.0, "clock before 2020: {a}");
        assert!(b >= a);
    }
}
