//! Display name to filesystem-safe filename conversion.
//!
//! The output alphabet is ASCII letters, digits, `_` and `-` for the stem, plus an optional
//! `.` and a lowercase alphanumeric extension. Accented letters are transliterated to their
//! base letter; everything else collapses into a single `_`.

use crate::constants::{FALLBACK_STEM, MAX_EXTENSION_LENGTH, PLACEHOLDER};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Converts an arbitrary display name into a filesystem-safe name of at most `max_length`
/// characters.
///
/// The extension is split off at the last dot, sanitized separately and kept when it fits.
/// A name that sanitizes to nothing becomes [`FALLBACK_STEM`], so the result is never empty.
/// Applying the function to its own output returns the output unchanged.
pub fn sanitize(name: &str, max_length: usize) -> String {
    let max_length = max_length.max(1);
    let (stem, extension) = split_extension(name.trim());

    let mut extension = extension.map(sanitize_extension).unwrap_or_default();
    if !extension.is_empty() && extension.len() + 2 > max_length {
        extension.clear();
    }

    let budget = if extension.is_empty() {
        max_length
    } else {
        max_length - extension.len() - 1
    };

    let stem = finish_stem(&transliterate_stem(stem), budget);

    if extension.is_empty() {
        stem
    } else {
        format!("{}.{}", stem, extension)
    }
}

/// Normalises a display name before it is recorded: whitespace runs collapse to one space,
/// the ends are trimmed and `/` becomes `-`.
pub fn tidy_display_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('/', "-")
}

/// Splits at the last dot. A leading dot (hidden files) or an empty tail does not count as
/// an extension separator.
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(0) | None => (name, None),
        Some(index) if index + 1 == name.len() => (name, None),
        Some(index) => (&name[..index], Some(&name[index + 1..])),
    }
}

fn sanitize_extension(extension: &str) -> String {
    extension
        .nfkd()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .take(MAX_EXTENSION_LENGTH)
        .collect()
}

fn transliterate_stem(stem: &str) -> String {
    let mut out = String::with_capacity(stem.len());

    for c in stem.nfkd() {
        if is_combining_mark(c) {
            continue;
        }
        match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => out.push(c),
            'ß' => out.push_str("ss"),
            'æ' => out.push_str("ae"),
            'Æ' => out.push_str("AE"),
            'œ' => out.push_str("oe"),
            'Œ' => out.push_str("OE"),
            'ø' => out.push('o'),
            'Ø' => out.push('O'),
            'đ' => out.push('d'),
            'Đ' => out.push('D'),
            'ł' => out.push('l'),
            'Ł' => out.push('L'),
            'þ' => out.push_str("th"),
            'Þ' => out.push_str("TH"),
            _ => out.push(PLACEHOLDER),
        }
    }

    collapse_placeholders(&out)
}

fn collapse_placeholders(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut previous_placeholder = false;

    for c in input.chars() {
        if c == PLACEHOLDER {
            if !previous_placeholder {
                out.push(c);
            }
            previous_placeholder = true;
        } else {
            out.push(c);
            previous_placeholder = false;
        }
    }

    out
}

fn trim_separators(input: &str) -> &str {
    input.trim_matches(|c| c == PLACEHOLDER || c == '-')
}

/// Truncates to `budget`, neutralises Windows device names and falls back to a placeholder
/// stem when nothing is left. The input is already restricted to ASCII.
fn finish_stem(stem: &str, budget: usize) -> String {
    let trimmed = trim_separators(stem);
    let truncated = trim_separators(&trimmed[..trimmed.len().min(budget)]);

    let options = sanitize_filename::Options {
        windows: true,
        truncate: false,
        replacement: "_",
    };
    let checked = sanitize_filename::sanitize_with_options(truncated, options);
    let checked = trim_separators(&checked);

    if checked.is_empty() {
        FALLBACK_STEM[..FALLBACK_STEM.len().min(budget)].to_owned()
    } else {
        checked.to_owned()
    }
}
