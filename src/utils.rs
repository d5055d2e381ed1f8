use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;
use thiserror::Error;
use unicode_width::UnicodeWidthStr;

static DURATION_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\s*(ms|h|m|s)").expect("valid duration regex"));

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid duration {0:?}: expected groups like 500ms, 30s, 2m, 1h")]
pub struct ParseDurationError(pub String);

/// Parses compound durations such as `"2m 30s"`, `"1h30m"` or `"500ms"`.
/// Groups may be separated by whitespace. A bare number is not accepted.
pub fn parse_duration(input: &str) -> Result<Duration, ParseDurationError> {
    let mut rest = input.trim();
    if rest.is_empty() {
        return Err(ParseDurationError(input.to_string()));
    }

    let mut total = Duration::ZERO;
    while !rest.is_empty() {
        let caps = DURATION_TOKEN
            .captures(rest)
            .ok_or_else(|| ParseDurationError(input.to_string()))?;
        let value: u64 = caps[1]
            .parse()
            .map_err(|_| ParseDurationError(input.to_string()))?;
        let unit = match &caps[2] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.saturating_mul(60)),
            _ => Duration::from_secs(value.saturating_mul(3600)),
        };
        total = total.saturating_add(unit);
        rest = rest[caps[0].len()..].trim_start();
    }

    Ok(total)
}

/// Renders a duration back into the compact form accepted by [`parse_duration`].
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 || millis % 1000 != 0 {
        return format!("{}ms", millis);
    }

    let secs = duration.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let mut parts = Vec::new();
    if h > 0 {
        parts.push(format!("{}h", h));
    }
    if m > 0 {
        parts.push(format!("{}m", m));
    }
    if s > 0 || parts.is_empty() {
        parts.push(format!("{}s", s));
    }
    parts.join(" ")
}

pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}

pub fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_duration(*duration))
}

/// Truncates a string to max_chars characters, appending "..." if truncated.
/// Safe for UTF-8 multi-byte characters.
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let truncate_at = max_chars.saturating_sub(3);
        let byte_index = s
            .char_indices()
            .nth(truncate_at)
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        format!("{}...", &s[..byte_index])
    }
}

/// Keeps the tail of a path-like string, prefixing "..." when shortened.
pub fn truncate_str_head(s: &str, max_chars: usize) -> String {
    let count = s.chars().count();
    if count <= max_chars {
        s.to_string()
    } else {
        let keep = max_chars.saturating_sub(3);
        let tail: String = s.chars().skip(count - keep).collect();
        format!("...{}", tail)
    }
}

/// Pads to `width` terminal columns. Wide characters take two.
pub fn pad_to_width(s: &str, width: usize) -> String {
    let used = UnicodeWidthStr::width(s);
    format!("{}{}", s, " ".repeat(width.saturating_sub(used)))
}
