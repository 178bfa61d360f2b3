// Text helpers shared by every feature.
//
// Pure string functions only, so they are cheap to test and safe to call from
// both the core services and the Discord layer.

use std::time::Duration;

/// Capitalise the first letter of every word and lowercase the rest.
/// Runs of whitespace collapse to a single space.
pub fn title_case(input: &str) -> String {
    input
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `"shift log channel"` -> `"shiftLogChannel"`. Underscores and dashes count as separators.
pub fn camel_case(input: &str) -> String {
    let mut out = String::new();
    for (i, word) in input
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|w| !w.is_empty())
        .enumerate()
    {
        let lower = word.to_lowercase();
        if i == 0 {
            out.push_str(&lower);
        } else {
            let mut chars = lower.chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_uppercase());
                out.push_str(chars.as_str());
            }
        }
    }
    out
}

/// Turn loose height input (`"511"`, `"5'11"`, `"5 11"`, `"60"`) into `5'11"`.
///
/// The first digit is feet, the remaining one or two digits are inches (0-11).
/// Returns `None` for anything that doesn't fit that shape.
pub fn format_height(input: &str) -> Option<String> {
    let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();
    if !(2..=3).contains(&digits.len()) {
        return None;
    }

    let (feet, inches) = digits.split_at(1);
    let feet: u32 = feet.parse().ok()?;
    let inches: u32 = inches.parse().ok()?;

    if feet == 0 || inches > 11 {
        return None;
    }

    Some(format!("{}'{}\"", feet, inches))
}

/// Compact human-readable duration: `"1d 4h 12m"`, `"45m"`, `"30s"`.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }

    if parts.is_empty() {
        format!("{}s", total)
    } else {
        parts.join(" ")
    }
}

/// Parse a duration string like `"2w"`, `"5d"`, `"12 hours"` or `"30 minutes"`.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim().to_lowercase();
    if input.is_empty() {
        return None;
    }

    // Split into the leading number and whatever unit follows it
    let split_at = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (number, unit) = input.split_at(split_at);
    let number: u64 = number.parse().ok()?;

    let multiplier = match unit.trim() {
        "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600,
        "d" | "day" | "days" => 86_400,
        "w" | "wk" | "wks" | "week" | "weeks" => 604_800,
        _ => return None,
    };

    number.checked_mul(multiplier).map(Duration::from_secs)
}

/// Cut `text` to at most `max` characters, marking the cut with an ellipsis.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut cut: String = text.chars().take(max - 1).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("reckless driving"), "Reckless Driving");
        assert_eq!(title_case("  EVADING   police "), "Evading Police");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_case("shift log channel"), "shiftLogChannel");
        assert_eq!(camel_case("Leave_Role-id"), "leaveRoleId");
        assert_eq!(camel_case("single"), "single");
    }

    #[test]
    fn test_format_height() {
        assert_eq!(format_height("511").as_deref(), Some("5'11\""));
        assert_eq!(format_height("5'9").as_deref(), Some("5'9\""));
        assert_eq!(format_height("6 0").as_deref(), Some("6'0\""));
        assert_eq!(format_height("512"), None);
        assert_eq!(format_height("5"), None);
        assert_eq!(format_height("abc"), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(3_900)), "1h 5m");
        assert_eq!(format_duration(Duration::from_secs(90_061)), "1d 1h 1m");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("2w"), Some(Duration::from_secs(1_209_600)));
        assert_eq!(parse_duration("5 days"), Some(Duration::from_secs(432_000)));
        assert_eq!(parse_duration("12h"), Some(Duration::from_secs(43_200)));
        assert_eq!(parse_duration("three days"), None);
        assert_eq!(parse_duration("10 fortnights"), None);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }
}
