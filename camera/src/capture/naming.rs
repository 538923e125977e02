use chrono::{DateTime, Utc};

/// File name for a capture that started at `started_ms` (Unix millis).
///
/// Two captures started in the same millisecond get the same name; the
/// storage layer refuses the second allocation rather than overwriting.
pub fn capture_file_name(prefix: &str, started_ms: i64) -> String {
    format!("{prefix}_{started_ms}.png")
}

/// Human-readable form of the capture time, for logs.
pub fn capture_time_label(started_ms: i64) -> String {
    let dt: DateTime<Utc> = DateTime::from_timestamp_millis(started_ms).unwrap_or_else(Utc::now);
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_embeds_prefix_and_millis() {
        assert_eq!(
            capture_file_name("snapcam", 1708300000123),
            "snapcam_1708300000123.png"
        );
    }

    #[test]
    fn different_millis_give_different_names() {
        let a = capture_file_name("snapcam", 1708300000000);
        let b = capture_file_name("snapcam", 1708300000001);
        assert_ne!(a, b);
    }

    #[test]
    fn same_millis_collide() {
        assert_eq!(
            capture_file_name("snapcam", 42),
            capture_file_name("snapcam", 42)
        );
    }

    #[test]
    fn label_is_utc_with_millis() {
        assert_eq!(capture_time_label(1708300000123), "2024-02-18T23:46:40.123Z");
    }
}
