use std::sync::LazyLock;

use regex::Regex;

static BARE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+)?$").expect("bare number pattern is valid"));

/// Normalizes a distance for display. A bare number gets the kilometer suffix,
/// anything else is only trimmed. Blank input is returned untouched.
pub fn format_distance(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return input.to_string();
    }

    if BARE_NUMBER.is_match(trimmed) {
        format!("{trimmed}K")
    } else {
        trimmed.to_string()
    }
}

/// Rebuilds a typed time value as `HH`, `HH:MM` or `HH:MM:SS` from its digits.
pub fn format_time_input(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).take(6).collect();
    match digits.len() {
        0..=2 => digits,
        3..=4 => format!("{}:{}", &digits[..2], &digits[2..]),
        _ => format!("{}:{}:{}", &digits[..2], &digits[2..4], &digits[4..]),
    }
}
