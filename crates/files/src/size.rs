//! Human readable byte sizes.

const UNITS: [&str; 8] = ["KiB", "MiB", "GiB", "TiB", "PiB", "EiB", "ZiB", "YiB"];

/// Significant digits shown for sizes of 1 KiB and up.
const SIGNIFICANT_DIGITS: i32 = 3;

/// Formats a byte count, e.g. `512 B`, `1.50 KiB`, `999 KiB`, `1.00 MiB`.
///
/// A unit is used while the scaled value stays below 1000, so a value never shows four
/// integer digits. Digits past the third significant one are cut off, not rounded.
pub fn human_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let bytes = bytes as f64;
    let mut multiplier = 1.0_f64;
    for unit in UNITS {
        multiplier *= 1024.0;
        if bytes < multiplier * 1000.0 {
            return format!("{} {}", limit_digits(bytes / multiplier), unit);
        }
    }

    format!("{} {}", limit_digits(bytes / multiplier), UNITS[UNITS.len() - 1])
}

/// Truncates `value` to three significant digits, padding with zero decimals.
fn limit_digits(value: f64) -> String {
    let integer_digits = if value < 1.0 {
        1
    } else {
        value.log10().floor() as i32 + 1
    };

    let decimals = SIGNIFICANT_DIGITS - integer_digits;
    if decimals < 1 {
        return format!("{}", value.floor());
    }

    let scale = 10_f64.powi(decimals);
    // 0.29 * 100.0 == 28.999999999999996
    let truncated = ((value * scale) + 1e-9).floor() / scale;
    format!("{:.*}", decimals as usize, truncated)
}
