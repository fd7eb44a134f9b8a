//! Human-readable formatting for durations and byte sizes in log lines

use std::time::Duration;

/// Formats a byte count with binary units
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{:.0}{}", size, UNITS[unit_index])
    } else if size >= 10.0 {
        format!("{:.1}{}", size, UNITS[unit_index])
    } else {
        format!("{:.2}{}", size, UNITS[unit_index])
    }
}

/// Formats an elapsed duration, e.g. `850ms`, `2.50s`, `3m12s`, `1h5m`
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis() as u64;
    if millis == 0 {
        return "0ms".to_string();
    }

    if millis < 1000 {
        format!("{}ms", millis)
    } else if millis < 60_000 {
        let seconds = millis as f64 / 1000.0;
        if seconds >= 10.0 {
            format!("{:.1}s", seconds)
        } else {
            format!("{:.2}s", seconds)
        }
    } else if millis < 3_600_000 {
        let total_seconds = millis / 1000;
        let minutes = total_seconds / 60;
        let seconds = total_seconds % 60;

        if seconds == 0 {
            format!("{}m", minutes)
        } else {
            format!("{}m{}s", minutes, seconds)
        }
    } else {
        let total_seconds = millis / 1000;
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        match (minutes, seconds) {
            (0, 0) => format!("{}h", hours),
            (_, 0) => format!("{}h{}m", hours, minutes),
            _ => format!("{}h{}m{}s", hours, minutes, seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, "0B")]
    #[case(512, "512B")]
    #[case(1536, "1.50KB")]
    #[case(10 * 1024 * 1024, "10.0MB")]
    fn test_format_bytes(#[case] bytes: u64, #[case] expected: &str) {
        assert_eq!(format_bytes(bytes), expected);
    }

    #[rstest]
    #[case(0, "0ms")]
    #[case(850, "850ms")]
    #[case(2_500, "2.50s")]
    #[case(15_000, "15.0s")]
    #[case(120_000, "2m")]
    #[case(192_000, "3m12s")]
    #[case(3_600_000, "1h")]
    #[case(3_900_000, "1h5m")]
    #[case(3_661_000, "1h1m1s")]
    fn test_format_duration(#[case] millis: u64, #[case] expected: &str) {
        assert_eq!(format_duration(Duration::from_millis(millis)), expected);
    }
}
