//! Time formatting helpers.

/// Format a duration in seconds to a human-readable string.
pub fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs < 86400 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
    }
}

/// How long ago `then` was, seen from `now` (both epoch seconds).
pub fn format_age(then: u64, now: u64) -> String {
    if then == 0 {
        return "never".to_string();
    }
    format!("{} ago", format_duration(now.saturating_sub(then)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(format_duration(42), "42s");
        assert_eq!(format_duration(125), "2m 5s");
        assert_eq!(format_duration(3600), "1h 0m");
        assert_eq!(format_duration(90_000), "1d 1h");
    }

    #[test]
    fn ages() {
        assert_eq!(format_age(0, 1_000), "never");
        assert_eq!(format_age(940, 1_000), "1m 0s ago");
        assert_eq!(format_age(2_000, 1_000), "0s ago");
    }
}
