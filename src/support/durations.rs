use once_cell::sync::Lazy;
use regex::Regex;

static DURATION: Lazy<Regex> = Lazy::new(|| Regex::new("^([0-9]+)(ms|s|m|h|d)?$").unwrap());

/// Parses `90m`, `2h`, `45s`, `1d`, or bare milliseconds.
pub fn parse_duration_ms(s: &str) -> Option<i64> {
    let caps = DURATION.captures(s.trim())?;
    let n = caps.get(1)?.as_str().parse::<i64>().ok()?;

    let unit = match caps.get(2).map(|m| m.as_str()) {
        None | Some("ms") => 1,
        Some("s") => 1_000,
        Some("m") => 60_000,
        Some("h") => 3_600_000,
        Some("d") => 86_400_000,
        Some(_) => return None,
    };

    n.checked_mul(unit)
}

pub fn format_duration_ms(ms: i64) -> String {
    let minutes = ms.max(0) / 60_000;
    let (h, m) = (minutes / 60, minutes % 60);

    match (h, m) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h {}m", h, m),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(parse_duration_ms("1800000"), Some(1_800_000));
        assert_eq!(parse_duration_ms("30m"), Some(1_800_000));
        assert_eq!(parse_duration_ms(" 2h "), Some(7_200_000));
        assert_eq!(parse_duration_ms("1d"), Some(86_400_000));
        assert_eq!(parse_duration_ms("-5m"), None);
        assert_eq!(parse_duration_ms("5 weeks"), None);
    }

    #[test]
    fn test_format() {
        assert_eq!(format_duration_ms(0), "0m");
        assert_eq!(format_duration_ms(1_800_000), "30m");
        assert_eq!(format_duration_ms(7_200_000), "2h");
        assert_eq!(format_duration_ms(5_459_999), "1h 30m");
    }
}
