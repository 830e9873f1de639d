//! Numeric cell values on the wire.
//!
//! Numbers are written with at most 15 significant digits, a `.` decimal
//! point and no grouping, independent of any locale. Integral values below
//! 10^15 are written without a fraction, and magnitudes outside
//! `[1e-5, 1e15)` use the `E+NN` / `E-NN` exponent form.

use crate::ooxml::error::{OoxmlError, Result};

const SIGNIFICANT_DIGITS: usize = 15;
const PLAIN_MIN_EXPONENT: i32 = -5;
const PLAIN_MAX_EXPONENT: i32 = 15;

/// Serialize a cell number.
///
/// ```
/// use loquat::ooxml::xlsx::number::format_number;
/// assert_eq!(format_number(42.0), "42");
/// assert_eq!(format_number(0.1 + 0.2), "0.3");
/// assert_eq!(format_number(3.14159265358979), "3.14159265358979");
/// assert_eq!(format_number(1.5e20), "1.5E+20");
/// assert_eq!(format_number(-2.5e-7), "-2.5E-07");
/// ```
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        let mut buf = itoa::Buffer::new();
        return buf.format(value as i64).to_string();
    }

    // d.dddddddddddddde±x, rounded to 15 significant digits
    let scientific = format!("{:.*e}", SIGNIFICANT_DIGITS - 1, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let negative = mantissa.starts_with('-');
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let digits = digits.trim_end_matches('0');
    let digits = if digits.is_empty() { "0" } else { digits };

    let mut out = String::with_capacity(24);
    if negative {
        out.push('-');
    }
    if (PLAIN_MIN_EXPONENT..PLAIN_MAX_EXPONENT).contains(&exponent) {
        push_plain(&mut out, digits, exponent);
    } else {
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        out.push('E');
        out.push(if exponent < 0 { '-' } else { '+' });
        let magnitude = exponent.unsigned_abs();
        if magnitude < 10 {
            out.push('0');
        }
        let mut buf = itoa::Buffer::new();
        out.push_str(buf.format(magnitude));
    }
    out
}

/// Write `0.digits × 10^(exponent + 1)` without an exponent.
fn push_plain(out: &mut String, digits: &str, exponent: i32) {
    if exponent < 0 {
        out.push_str("0.");
        for _ in 0..(-exponent - 1) {
            out.push('0');
        }
        out.push_str(digits);
        return;
    }
    let int_len = exponent as usize + 1;
    if digits.len() <= int_len {
        out.push_str(digits);
        for _ in digits.len()..int_len {
            out.push('0');
        }
    } else {
        out.push_str(&digits[..int_len]);
        out.push('.');
        out.push_str(&digits[int_len..]);
    }
}

/// Parse a number as found in a `<v>` element.
pub fn parse_number(text: &str) -> Result<f64> {
    let trimmed = text.trim();
    fast_float2::parse::<f64, _>(trimmed)
        .map_err(|_| OoxmlError::InvalidFormat(format!("Not a number: {:?}", trimmed)))
}
