use chrono::{DateTime, FixedOffset, Offset, Timelike, Utc};

/// The daily digest window: a fixed local hour expressed as a constant UTC
/// offset. No daylight-saving awareness; the offset is whatever the operator
/// configures (defaults match 09:00 at UTC+2).
#[derive(Debug, Clone, Copy)]
pub struct DigestWindow {
    local_hour: u32,
    utc_offset_hours: i32,
}

impl DigestWindow {
    pub fn new(local_hour: u32, utc_offset_hours: i32) -> Self {
        Self {
            local_hour,
            utc_offset_hours,
        }
    }

    pub fn is_digest_hour(&self, timestamp: u64) -> bool {
        is_digest_hour(timestamp, self.local_hour, self.utc_offset_hours)
    }
}

/// Exact-hour match: true iff the tick's hour of day at the fixed offset
/// equals the digest hour. Minutes inside the hour still match; the adjacent
/// hours never do.
pub fn is_digest_hour(timestamp: u64, local_hour: u32, utc_offset_hours: i32) -> bool {
    let Some(tick) = DateTime::from_timestamp(timestamp as i64, 0) else {
        return false;
    };
    let offset = FixedOffset::east_opt(utc_offset_hours.saturating_mul(3_600))
        .unwrap_or_else(|| Utc.fix());
    tick.with_timezone(&offset).hour() == local_hour
}

#[cfg(test)]
mod tests {
    use super::{is_digest_hour, DigestWindow};

    // 2023-03-07 07:00:00 UTC == 09:00 at UTC+2.
    const SEVEN_AM_UTC: u64 = 1_678_172_400;

    #[test]
    fn test_digest_hour_matches_exact_boundary() {
        let window = DigestWindow::new(9, 2);
        assert!(window.is_digest_hour(SEVEN_AM_UTC));
    }

    #[test]
    fn test_minutes_inside_the_hour_still_match() {
        // The check compares whole hours, so any timestamp within
        // 07:00..08:00 UTC is part of the digest window.
        let window = DigestWindow::new(9, 2);
        assert!(window.is_digest_hour(SEVEN_AM_UTC + 60));
        assert!(window.is_digest_hour(SEVEN_AM_UTC + 3_599));
    }

    #[test]
    fn test_adjacent_hours_do_not_match() {
        let window = DigestWindow::new(9, 2);
        assert!(!window.is_digest_hour(SEVEN_AM_UTC - 60));
        assert!(!window.is_digest_hour(SEVEN_AM_UTC - 3_600));
        assert!(!window.is_digest_hour(SEVEN_AM_UTC + 3_600));
    }

    #[test]
    fn test_utc_window_without_offset() {
        // 09:00 UTC with no offset.
        assert!(is_digest_hour(SEVEN_AM_UTC + 2 * 3_600, 9, 0));
        assert!(!is_digest_hour(SEVEN_AM_UTC, 9, 0));
    }

    #[test]
    fn test_offset_wraps_across_midnight() {
        // Local hour 0 at UTC+2 lands on 22:00 UTC of the previous local day.
        let ten_pm_utc = SEVEN_AM_UTC + 15 * 3_600;
        assert!(is_digest_hour(ten_pm_utc, 0, 2));
        assert!(!is_digest_hour(ten_pm_utc - 3_600, 0, 2));
    }

    #[test]
    fn test_negative_offset() {
        // 09:00 at UTC-5 is 14:00 UTC.
        assert!(is_digest_hour(SEVEN_AM_UTC + 7 * 3_600, 9, -5));
        assert!(!is_digest_hour(SEVEN_AM_UTC + 6 * 3_600, 9, -5));
    }
}
