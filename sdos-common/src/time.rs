//! Timing utilities

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format an elapsed duration as seconds with millisecond precision (`1.234s`)
pub fn format_seconds(elapsed: Duration) -> String {
    format!("{:.3}s", elapsed.as_secs_f64())
}

/// Age of a timestamp relative to now, clamped at zero for future timestamps
pub fn age_of(timestamp: DateTime<Utc>) -> Duration {
    (now() - timestamp).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_format_seconds_millisecond_precision() {
        assert_eq!(format_seconds(Duration::from_millis(0)), "0.000s");
        assert_eq!(format_seconds(Duration::from_millis(1234)), "1.234s");
        assert_eq!(format_seconds(Duration::from_secs(90)), "90.000s");
    }

    #[test]
    fn test_age_of_past_timestamp() {
        let then = now() - chrono::Duration::hours(2);
        let age = age_of(then);
        assert!(age >= Duration::from_secs(2 * 3600 - 1));
    }

    #[test]
    fn test_age_of_future_timestamp_is_zero() {
        let later = now() + chrono::Duration::hours(1);
        assert_eq!(age_of(later), Duration::ZERO);
    }
}
