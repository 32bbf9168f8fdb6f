use serde_json::Value as JsonValue;

use super::{CastFailure, CastOptions, CastResult};
use crate::data::Value;

const CURRENCY_SYMBOLS: &[char] = &[
    '$', '¢', '£', '¤', '¥', '֏', '؋', '৳', '฿', '₡', '₦', '₩', '₪', '₫', '€', '₭', '₮', '₱',
    '₲', '₴', '₵', '₸', '₹', '₺', '₼', '₽', '₾', '₿',
];

const PERCENT_SIGNS: &[char] = &['%', '‰', '‱'];

pub fn cast_integer(raw: &JsonValue, options: &CastOptions) -> CastResult {
    match raw {
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(Value::Integer(i));
            }
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                    Ok(Value::Integer(f as i64))
                }
                _ => Err(CastFailure::expected("integer", raw)),
            }
        }
        JsonValue::String(s) => {
            let candidate = if options.bare_number {
                s.as_str()
            } else {
                strip_non_numeric(s)
            };
            match candidate.parse::<i64>() {
                Ok(parsed) if parsed.to_string() == candidate => Ok(Value::Integer(parsed)),
                _ => Err(CastFailure::expected("integer", raw)),
            }
        }
        _ => Err(CastFailure::expected("integer", raw)),
    }
}

pub fn cast_number(raw: &JsonValue, options: &CastOptions) -> CastResult {
    let s = match raw {
        JsonValue::Number(n) => {
            return n
                .as_f64()
                .map(Value::Number)
                .ok_or_else(|| CastFailure::expected("number", raw));
        }
        JsonValue::String(s) => s,
        _ => return Err(CastFailure::expected("number", raw)),
    };

    let mut text: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    match text.as_str() {
        "NaN" => return Ok(Value::Number(f64::NAN)),
        "INF" => return Ok(Value::Number(f64::INFINITY)),
        "-INF" => return Ok(Value::Number(f64::NEG_INFINITY)),
        _ => {}
    }

    if !options.group_char.is_empty() {
        text = text.replace(options.group_char.as_str(), "");
    }
    if options.decimal_char != "." {
        text = text.replace(options.decimal_char.as_str(), ".");
    }
    if options.currency {
        text.retain(|c| !CURRENCY_SYMBOLS.contains(&c));
    }
    let percentage = text.contains(PERCENT_SIGNS);
    if percentage {
        text.retain(|c| !PERCENT_SIGNS.contains(&c));
    }
    let candidate = if options.bare_number {
        text.as_str()
    } else {
        strip_non_numeric(&text)
    };

    if !is_decimal_literal(candidate) {
        return Err(CastFailure::expected("number", raw));
    }
    let parsed: f64 = candidate
        .parse()
        .map_err(|_| CastFailure::expected("number", raw))?;
    Ok(Value::Number(if percentage { parsed / 100.0 } else { parsed }))
}

/// Drops leading and trailing characters that cannot start or end a number.
fn strip_non_numeric(value: &str) -> &str {
    value
        .trim_start_matches(|c: char| !(c.is_ascii_digit() || matches!(c, '-' | '+' | '.')))
        .trim_end_matches(|c: char| !c.is_ascii_digit())
}

/// `[+-]digits[.digits][e[+-]digits]`, requiring at least one mantissa digit.
fn is_decimal_literal(value: &str) -> bool {
    let body = value.strip_prefix(['+', '-']).unwrap_or(value);
    let (mantissa, exponent) = match body.split_once(['e', 'E']) {
        Some((m, e)) => (m, Some(e)),
        None => (body, None),
    };
    let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let digits_only = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if whole.is_empty() && fraction.is_empty() {
        return false;
    }
    if !digits_only(whole) || !digits_only(fraction) {
        return false;
    }
    match exponent {
        Some(exp) => {
            let exp = exp.strip_prefix(['+', '-']).unwrap_or(exp);
            !exp.is_empty() && digits_only(exp)
        }
        None => true,
    }
}
