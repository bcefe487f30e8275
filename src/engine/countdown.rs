/// Formats a countdown as `M:SS`. Negative and non-finite input shows `0:00`.
pub fn format_countdown(seconds: f64) -> String {
    let whole = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };

    format!("{}:{:02}", whole / 60, whole % 60)
}

#[cfg(test)]
mod tests {
    use super::format_countdown;

    #[test]
    fn formats_minutes_and_padded_seconds() {
        assert_eq!(format_countdown(125.0), "2:05");
        assert_eq!(format_countdown(59.0), "0:59");
        assert_eq!(format_countdown(3600.0), "60:00");
    }

    #[test]
    fn clamps_and_floors() {
        assert_eq!(format_countdown(-5.0), "0:00");
        assert_eq!(format_countdown(0.999), "0:00");
        assert_eq!(format_countdown(61.9), "1:01");
        assert_eq!(format_countdown(f64::NAN), "0:00");
    }
}
