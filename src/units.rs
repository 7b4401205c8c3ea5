//! Human-readable byte sizes and durations
//!
//! Sizes use binary prefixes with two decimals (`1.50 MiB`). Parsing accepts
//! both decimal (`kB`, `MB`) and binary (`KiB`, `MiB`) suffixes, case-insensitive,
//! with or without whitespace between number and unit.

use crate::error::ConfigError;

const BINARY_PREFIXES: [(&str, u64); 5] = [
    ("Pi", 1 << 50),
    ("Ti", 1 << 40),
    ("Gi", 1 << 30),
    ("Mi", 1 << 20),
    ("ki", 1 << 10),
];

/// Format a byte count, switching prefix once the value reaches 90% of it
pub fn format_bytes(n: u64) -> String {
    for (prefix, k) in BINARY_PREFIXES {
        if n as f64 >= k as f64 * 0.9 {
            return format!("{:.2} {}B", n as f64 / k as f64, prefix);
        }
    }
    format!("{} B", n)
}

/// Format a bandwidth in bytes per second
pub fn format_bandwidth(bytes_per_sec: f64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec.max(0.0) as u64))
}

/// Format a duration given in seconds
pub fn format_time(seconds: f64) -> String {
    const MINUTE: f64 = 60.0;
    const HOUR: f64 = 60.0 * MINUTE;
    const DAY: f64 = 24.0 * HOUR;

    let n = seconds;
    if n > 2.0 * DAY {
        let d = (n / DAY) as u64;
        let h = ((n - d as f64 * DAY) / HOUR) as u64;
        format!("{}d {}hr", d, h)
    } else if n > 2.0 * HOUR {
        let h = (n / HOUR) as u64;
        let m = ((n - h as f64 * HOUR) / MINUTE) as u64;
        format!("{}hr {}m", h, m)
    } else if n > 10.0 * MINUTE {
        let m = (n / MINUTE) as u64;
        let s = (n - m as f64 * MINUTE) as u64;
        format!("{}m {}s", m, s)
    } else if n >= 1.0 {
        format!("{:.2} s", n)
    } else if n >= 1e-3 {
        format!("{:.2} ms", n * 1e3)
    } else {
        format!("{:.2} us", n * 1e6)
    }
}

fn unit_multiplier(suffix: &str) -> Option<u64> {
    let multiplier = match suffix.to_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" => 1_000,
        "m" | "mb" => 1_000_000,
        "g" | "gb" => 1_000_000_000,
        "t" | "tb" => 1_000_000_000_000,
        "p" | "pb" => 1_000_000_000_000_000,
        "ki" | "kib" => 1 << 10,
        "mi" | "mib" => 1 << 20,
        "gi" | "gib" => 1 << 30,
        "ti" | "tib" => 1 << 40,
        "pi" | "pib" => 1 << 50,
        _ => return None,
    };
    Some(multiplier)
}

/// Parse a human-readable byte string such as `"1 MiB"`, `"5kB"` or `"100"`
///
/// A bare unit (`"MiB"`) means one of that unit. Fractional values are
/// truncated to whole bytes.
pub fn parse_bytes(input: &str) -> Result<u64, ConfigError> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(ConfigError::missing("byte size"));
    }
    let compact = if compact.chars().any(|c| c.is_ascii_digit()) {
        compact
    } else {
        format!("1{}", compact)
    };

    let split = compact
        .char_indices()
        .rev()
        .find(|(_, c)| !c.is_alphabetic())
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let (number, suffix) = compact.split_at(split);

    let value: f64 = number.parse().map_err(|_| {
        ConfigError::invalid_setting("byte size", format!("could not parse {:?}", input))
    })?;
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::invalid_setting(
            "byte size",
            format!("{:?} is not a non-negative size", input),
        ));
    }
    let multiplier = unit_multiplier(suffix).ok_or_else(|| {
        ConfigError::invalid_setting("byte size", format!("unknown unit {:?}", suffix))
    })?;

    Ok((value * multiplier as f64) as u64)
}
