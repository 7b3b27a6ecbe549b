//! The yard clock.
//!
//! Every server-produced timestamp in the system comes from one wall clock in
//! a fixed `+07:00` offset (Asia/Ho_Chi_Minh, which observes no DST), so the
//! gate-visible ISO-8601 strings always carry the same offset.

use chrono::{DateTime, FixedOffset, Utc};

/// Seconds east of UTC for the yard's zone.
const YARD_OFFSET_SECS: i32 = 7 * 3600;

fn yard_offset() -> FixedOffset {
    // +07:00 is always representable
    FixedOffset::east_opt(YARD_OFFSET_SECS).unwrap()
}

/// Current time on the yard clock.
pub fn now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&yard_offset())
}

/// Convert any timestamp into the yard's offset.
pub fn to_yard(ts: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    ts.with_timezone(&yard_offset())
}

/// Epoch seconds, used for image file names (`{PLATE}_{epoch}.jpg`).
pub fn epoch_secs() -> i64 {
    Utc::now().timestamp()
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yard_time_carries_plus_seven() {
        let ts = now();
        assert_eq!(ts.offset().local_minus_utc(), 7 * 3600);
        assert!(ts.to_rfc3339().ends_with("+07:00"));
    }

    #[test]
    fn to_yard_preserves_instant() {
        let utc_now = Utc::now().fixed_offset();
        let local = to_yard(utc_now);
        assert_eq!(local.timestamp(), utc_now.timestamp());
        assert_eq!(local.offset().local_minus_utc(), 7 * 3600);
    }
}
