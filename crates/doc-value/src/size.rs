//! JSON size calculation.
//!
//! Sizes are the exact byte lengths of the compact JSON text that
//! `serde_json::to_string()` would produce, computed without serializing.

use crate::value::{Scalar, Value};

/// Size of a JSON number literal in decimal digits (and sign).
pub fn int_size(n: i64) -> usize {
    let mut size = if n < 0 { 2 } else { 1 };
    let mut rest = n.unsigned_abs();
    while rest >= 10 {
        rest /= 10;
        size += 1;
    }
    size
}

/// Size of an unsigned integer literal, used for array indices and lengths.
pub fn usize_size(n: usize) -> usize {
    let mut size = 1;
    let mut rest = n;
    while rest >= 10 {
        rest /= 10;
        size += 1;
    }
    size
}

fn float_size(f: f64) -> usize {
    // Non-finite floats never reach the JSON wire; count them as `null`.
    serde_json::Number::from_f64(f)
        .map(|n| n.to_string().len())
        .unwrap_or(4)
}

/// Computes the JSON-encoded size of a string including quotes and escape
/// sequences.
///
/// # Examples
///
/// ```
/// use doc_value::size::string_size;
///
/// assert_eq!(string_size("hello"), 7);
/// assert_eq!(string_size("a\"b"), 6);
/// assert_eq!(string_size("\u{1}"), 8);
/// ```
pub fn string_size(s: &str) -> usize {
    let mut size = 2; // Opening and closing quotes

    for ch in s.chars() {
        match ch {
            '\u{0008}' | '\t' | '\n' | '\u{000C}' | '\r' | '"' | '\\' => size += 2,
            // Remaining C0 control characters are written as \u00XX
            c if (c as u32) < 0x20 => size += 6,
            c => size += c.len_utf8(),
        }
    }

    size
}

/// Size of a bracketed, comma-separated list whose items have the given sizes.
pub fn list_size<I: IntoIterator<Item = usize>>(items: I) -> usize {
    let mut size = 2; // [ ] or { }
    let mut count = 0;
    for item in items {
        size += item;
        count += 1;
    }
    if count > 1 {
        size += count - 1; // commas
    }
    size
}

/// Computes the exact JSON size of a value.
///
/// # Examples
///
/// ```
/// use doc_value::{size::json_size, Value};
///
/// assert_eq!(json_size(&Value::NULL), 4);
/// assert_eq!(json_size(&Value::from("hello")), 7);
/// assert_eq!(json_size(&Value::from(-123i64)), 4);
/// ```
pub fn json_size(value: &Value) -> usize {
    match value {
        Value::Scalar(s) => scalar_size(s),
        Value::Array(arr) => list_size(arr.iter().map(json_size)),
        Value::Object(map) => list_size(
            map.iter()
                .map(|(key, val)| string_size(key) + 1 + json_size(val)),
        ),
    }
}

pub fn scalar_size(s: &Scalar) -> usize {
    match s {
        Scalar::Null => 4,
        Scalar::Bool(true) => 4,
        Scalar::Bool(false) => 5,
        Scalar::Int(n) => int_size(*n),
        Scalar::Float(f) => float_size(*f),
        Scalar::Str(s) => string_size(s),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
