//! Canonical block-file names: `rf@<seconds>.<millis:03>.h5`.
//!
//! Seconds are not zero-padded, so lexicographic order of names matches
//! chronological order only while every compared name has the same number of
//! seconds digits.

const PREFIX: &str = "rf@";
const SUFFIX: &str = ".h5";

pub fn encode(ms: u64) -> String {
    format!("{PREFIX}{}.{:03}{SUFFIX}", ms / 1000, ms % 1000)
}

/// Returns `None` for names outside the canonical pattern.
pub fn decode(name: &str) -> Option<u64> {
    let (seconds, fraction) = split_canonical(name)?;
    let seconds: u64 = seconds.parse().ok()?;
    // Pad or truncate the fractional part to exactly three digits.
    let millis: u64 = format!("{fraction:0<3}")[..3].parse().ok()?;
    seconds.checked_mul(1000)?.checked_add(millis)
}

pub fn is_canonical(name: &str) -> bool {
    split_canonical(name).is_some()
}

fn split_canonical(name: &str) -> Option<(&str, &str)> {
    if !name.is_ascii() || name.len() < PREFIX.len() + SUFFIX.len() {
        return None;
    }
    let (head, rest) = name.split_at(PREFIX.len());
    if !head.eq_ignore_ascii_case(PREFIX) {
        return None;
    }
    let (body, tail) = rest.split_at(rest.len() - SUFFIX.len());
    if !tail.eq_ignore_ascii_case(SUFFIX) {
        return None;
    }
    let (seconds, fraction) = body.split_once('.')?;
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if all_digits(seconds) && all_digits(fraction) {
        Some((seconds, fraction))
    } else {
        None
    }
}
