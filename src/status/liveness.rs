//! Device liveness derived from reading timestamps.
//!
//! `now` is always an explicit parameter so these functions stay
//! deterministic under test; the caller supplies the clock.

use chrono::{DateTime, Utc};

/// Recency window for the dashboard's online/offline split, in minutes.
pub const DEFAULT_ONLINE_THRESHOLD_MINUTES: f64 = 10.0;

/// Whole minutes elapsed between a reading's timestamp and `now`.
///
/// Returns `f64::INFINITY` when the timestamp is missing, so staleness
/// comparisons treat the device as never seen. A timestamp ahead of `now`
/// yields a non-positive count.
pub fn minutes_since(timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match timestamp {
        Some(ts) => ((now - ts).num_milliseconds() as f64 / 60_000.0).floor(),
        None => f64::INFINITY,
    }
}

/// Whether a device counts as online: last seen at most `threshold_minutes`
/// ago, boundary inclusive.
pub fn is_online(
    timestamp: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    threshold_minutes: f64,
) -> bool {
    minutes_since(timestamp, now) <= threshold_minutes
}

/// Relative last-seen label for display: "Xm ago" under an hour, "Xh ago"
/// under a day, "Xd ago" beyond that, "Never" without a timestamp.
pub fn format_last_seen(timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let minutes = minutes_since(timestamp, now);

    if minutes.is_infinite() {
        return "Never".to_string();
    }

    // Readings stamped ahead of the local clock render as just seen
    let minutes = minutes.max(0.0) as i64;

    if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        format!("{}h ago", minutes / 60)
    } else {
        format!("{}d ago", minutes / 1440)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_minutes_since_floors_to_whole_minutes() {
        let now = fixed_now();

        let ts = now - Duration::seconds(90);
        assert_eq!(minutes_since(Some(ts), now), 1.0);

        // 10m59s still floors to 10
        let ts = now - Duration::seconds(659);
        assert_eq!(minutes_since(Some(ts), now), 10.0);
    }

    #[test]
    fn test_minutes_since_missing_is_infinite() {
        assert!(minutes_since(None, fixed_now()).is_infinite());
    }

    #[test]
    fn test_minutes_since_future_timestamp() {
        let now = fixed_now();
        let ts = now + Duration::seconds(30);

        // Math-floor semantics: half a minute ahead reads as -1
        assert_eq!(minutes_since(Some(ts), now), -1.0);
    }

    #[test]
    fn test_online_boundary_is_inclusive() {
        let now = fixed_now();

        let exactly_ten = now - Duration::minutes(10);
        assert!(is_online(Some(exactly_ten), now, 10.0));

        let eleven = now - Duration::minutes(11);
        assert!(!is_online(Some(eleven), now, 10.0));
    }

    #[test]
    fn test_online_stale_and_missing() {
        let now = fixed_now();

        let stale = now - Duration::minutes(15);
        assert!(!is_online(Some(stale), now, 10.0));
        assert!(!is_online(None, now, 10.0));
    }

    #[test]
    fn test_online_future_timestamp() {
        let now = fixed_now();
        let ahead = now + Duration::minutes(2);

        assert!(is_online(Some(ahead), now, 10.0));
    }

    #[test]
    fn test_format_last_seen_buckets() {
        let now = fixed_now();

        assert_eq!(format_last_seen(Some(now - Duration::minutes(5)), now), "5m ago");
        assert_eq!(format_last_seen(Some(now - Duration::minutes(59)), now), "59m ago");
        assert_eq!(format_last_seen(Some(now - Duration::minutes(60)), now), "1h ago");
        assert_eq!(format_last_seen(Some(now - Duration::hours(23)), now), "23h ago");
        assert_eq!(format_last_seen(Some(now - Duration::hours(24)), now), "1d ago");
        assert_eq!(format_last_seen(Some(now - Duration::days(3)), now), "3d ago");
    }

    #[test]
    fn test_format_last_seen_missing_and_future() {
        let now = fixed_now();

        assert_eq!(format_last_seen(None, now), "Never");
        assert_eq!(format_last_seen(Some(now + Duration::minutes(2)), now), "0m ago");
    }
}
