//! Parking fee schedule.
//!
//! First hour (or any part of it) costs 5000; every further started hour
//! adds 3000. Duration is the ceiling of the stay in minutes; billable
//! hours are the ceiling of those minutes over 60.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// Base fee covering the first hour
const BASE_FEE: i64 = 5000;
/// Each additional started hour
const HOURLY_FEE: i64 = 3000;

/// `(fee, duration_minutes)` for a stay.
pub fn calc_fee(
    time_in: DateTime<FixedOffset>,
    time_out: DateTime<FixedOffset>,
) -> (i64, i64) {
    let seconds = (time_out - time_in).num_seconds().max(0);
    let minutes = div_ceil_i64(seconds, 60);
    let hours = div_ceil_i64(minutes, 60);

    let fee = if hours <= 1 {
        BASE_FEE
    } else {
        BASE_FEE + (hours - 1) * HOURLY_FEE
    };
    (fee, minutes)
}

/// Billable hours for a minute count (at least one)
pub fn billable_hours(minutes: i64) -> i64 {
    div_ceil_i64(minutes, 60).max(1)
}

/// Ceiling division for non-negative `i64` values (`i64::div_ceil` is unstable
/// on this toolchain for signed types).
fn div_ceil_i64(a: i64, b: i64) -> i64 {
    (a + b - 1) / b
}

/// Quote returned by `GET /fee` before the exit flow starts
#[derive(Debug, Clone, Serialize)]
pub struct FeeQuote {
    pub ok: bool,
    pub plate: String,
    pub slot: String,
    pub gate: String,
    pub time_in: DateTime<FixedOffset>,
    pub time_out: DateTime<FixedOffset>,
    pub duration_minutes: i64,
    pub duration_hours: i64,
    pub amount: i64,
    pub trans_id: i32,
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset, TimeZone};

    fn at(h: u32, m: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 3, 1, h, m, 0)
            .unwrap()
    }

    #[test]
    fn first_hour_is_base_fee() {
        let (fee, minutes) = calc_fee(at(10, 0), at(10, 45));
        assert_eq!(minutes, 45);
        assert_eq!(fee, 5000);
    }

    #[test]
    fn exactly_one_hour_is_base_fee() {
        let (fee, minutes) = calc_fee(at(10, 0), at(11, 0));
        assert_eq!(minutes, 60);
        assert_eq!(fee, 5000);
    }

    #[test]
    fn two_and_a_half_hours() {
        // 10:00 → 12:30: m=150, h=3, fee = 5000 + 2×3000 = 11000
        let (fee, minutes) = calc_fee(at(10, 0), at(12, 30));
        assert_eq!(minutes, 150);
        assert_eq!(fee, 11_000);
    }

    #[test]
    fn one_minute_over_the_hour_starts_a_new_hour() {
        let (fee, minutes) = calc_fee(at(10, 0), at(11, 1));
        assert_eq!(minutes, 61);
        assert_eq!(fee, 8000);
    }

    #[test]
    fn partial_minute_rounds_up() {
        let t_in = at(10, 0);
        let t_out = t_in + Duration::seconds(61);
        let (fee, minutes) = calc_fee(t_in, t_out);
        assert_eq!(minutes, 2);
        assert_eq!(fee, 5000);
    }

    #[test]
    fn zero_duration_charges_base_fee() {
        let t = at(10, 0);
        let (fee, minutes) = calc_fee(t, t);
        assert_eq!(minutes, 0);
        assert_eq!(fee, 5000);
    }

    #[test]
    fn negative_duration_is_clamped() {
        // A skewed clock must never produce a negative fee
        let (fee, minutes) = calc_fee(at(12, 0), at(10, 0));
        assert_eq!(minutes, 0);
        assert_eq!(fee, 5000);
    }

    #[test]
    fn billable_hours_is_at_least_one() {
        assert_eq!(billable_hours(0), 1);
        assert_eq!(billable_hours(59), 1);
        assert_eq!(billable_hours(60), 1);
        assert_eq!(billable_hours(61), 2);
        assert_eq!(billable_hours(150), 3);
    }
}
