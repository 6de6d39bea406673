use bson::Bson;

use super::{Codec, CodecResult, narrow_integer};
use crate::error::CoercionError;

/// Whole numbers, stored as the narrowest BSON integer.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerCodec;

impl IntegerCodec {
    pub const TAG: &'static str = "integer";
}

/// Truncates toward zero. `None` if the result does not fit an `i64`.
fn truncate(value: f64) -> Option<i64> {
    let truncated = value.trunc();

    (i64::MIN as f64..i64::MAX as f64)
        .contains(&truncated)
        .then_some(truncated as i64)
}

fn parse_integer(input: &str) -> Result<i64, &'static str> {
    if let Ok(value) = input.parse::<i64>() {
        return Ok(value);
    }

    match input.parse::<f64>() {
        Ok(value) if value.is_finite() && is_numeric_literal(input) => truncate(value).ok_or("out of range"),
        _ => Err("not an integer"),
    }
}

/// Rejects the words `inf`, `nan` and `infinity` that `f64::from_str` accepts.
fn is_numeric_literal(input: &str) -> bool {
    input
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
}

impl Codec for IntegerCodec {
    fn mongoize(&self, value: Bson) -> CodecResult {
        match value {
            Bson::Int32(value) => Ok(Bson::Int32(value)),
            Bson::Int64(value) => Ok(narrow_integer(value)),
            Bson::Double(value) if value.is_finite() => truncate(value)
                .map(narrow_integer)
                .ok_or_else(|| CoercionError::new(Self::TAG, &Bson::Double(value), "out of range")),
            Bson::Double(value) => Err(CoercionError::new(Self::TAG, &Bson::Double(value), "not a finite number")),
            Bson::String(input) => {
                let trimmed = input.trim();
                if trimmed.is_empty() {
                    return Ok(Bson::Null);
                }

                parse_integer(trimmed)
                    .map(narrow_integer)
                    .map_err(|reason| CoercionError::new(Self::TAG, &Bson::String(input.clone()), reason))
            }
            other => Ok(other),
        }
    }

    fn demongoize(&self, value: Bson) -> CodecResult {
        Ok(self.mongoize(value.clone()).unwrap_or(value))
    }
}

/// Floating point numbers, stored as BSON doubles.
#[derive(Debug, Clone, Copy, Default)]
pub struct FloatCodec;

impl FloatCodec {
    pub const TAG: &'static str = "float";
}

impl Codec for FloatCodec {
    fn mongoize(&self, value: Bson) -> CodecResult {
        match value {
            Bson::Int32(value) => Ok(Bson::Double(value as f64)),
            Bson::Int64(value) => Ok(Bson::Double(value as f64)),
            Bson::String(input) => {
                let trimmed = input.trim();
                if trimmed.is_empty() {
                    return Ok(Bson::Null);
                }

                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|_| is_numeric_literal(trimmed))
                    .map(Bson::Double)
                    .ok_or_else(|| CoercionError::new(Self::TAG, &Bson::String(input.clone()), "not a number"))
            }
            other => Ok(other),
        }
    }

    fn demongoize(&self, value: Bson) -> CodecResult {
        Ok(self.mongoize(value.clone()).unwrap_or(value))
    }
}

/// Arbitrary precision decimals, stored as their canonical string so no precision is lost.
///
/// The canonical form has no sign for positive values, no leading zeros in the whole part and
/// no trailing zeros in the fraction, so `"+1.50"` and `"1.5"` store the same way. Magnitudes
/// needing more than [`DecimalCodec::PLAIN_PADDING`] zeros of padding use `E` notation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecimalCodec;

impl DecimalCodec {
    pub const TAG: &'static str = "decimal";

    /// Zeros a plain rendering may add before switching to `E` notation.
    pub const PLAIN_PADDING: usize = 64;

    const SPECIAL: [&'static str; 3] = ["NaN", "Infinity", "-Infinity"];

    fn render_double(value: f64) -> String {
        if value.is_nan() {
            "NaN".to_string()
        } else if value.is_infinite() {
            if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
        } else {
            value.to_string()
        }
    }

    fn normalize(&self, original: &Bson, text: &str) -> CodecResult {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Bson::Null);
        }
        if Self::SPECIAL.contains(&trimmed) {
            return Ok(Bson::String(trimmed.to_string()));
        }

        canonical_decimal(trimmed)
            .map(Bson::String)
            .ok_or_else(|| CoercionError::new(Self::TAG, original, "not a decimal"))
    }
}

/// Canonical text of a decimal literal, or `None` if `input` is not one.
fn canonical_decimal(input: &str) -> Option<String> {
    let (negative, unsigned) = match *input.as_bytes().first()? {
        b'-' => (true, &input[1..]),
        b'+' => (false, &input[1..]),
        _ => (false, input),
    };
    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(at) => (&unsigned[..at], i64::from(unsigned[at + 1..].parse::<i32>().ok()?)),
        None => (unsigned, 0),
    };
    let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));

    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.bytes().chain(fraction.bytes()).all(|byte| byte.is_ascii_digit()) {
        return None;
    }

    // `point` is where the decimal point sits within `digits`.
    let digits = format!("{whole}{fraction}");
    let significant = digits.trim_start_matches('0');
    let point = whole.len() as i64 + exponent - (digits.len() - significant.len()) as i64;
    let digits = significant.trim_end_matches('0');

    if digits.is_empty() {
        return Some("0".to_string());
    }

    let padding = DecimalCodec::PLAIN_PADDING as i64;
    let length = digits.len() as i64;
    let body = if point <= 0 && -point <= padding {
        format!("0.{}{digits}", "0".repeat(-point as usize))
    } else if point >= length && point - length <= padding {
        format!("{digits}{}", "0".repeat((point - length) as usize))
    } else if point > 0 && point < length {
        format!("{}.{}", &digits[..point as usize], &digits[point as usize..])
    } else {
        let (lead, rest) = digits.split_at(1);
        let separator = if rest.is_empty() { "" } else { "." };
        format!("{lead}{separator}{rest}E{}", point - 1)
    };

    Some(if negative { format!("-{body}") } else { body })
}

impl Codec for DecimalCodec {
    fn mongoize(&self, value: Bson) -> CodecResult {
        match &value {
            Bson::Int32(number) => Ok(Bson::String(number.to_string())),
            Bson::Int64(number) => Ok(Bson::String(number.to_string())),
            Bson::Double(number) => self.normalize(&value, &Self::render_double(*number)),
            Bson::Decimal128(number) => self.normalize(&value, &number.to_string()),
            Bson::String(text) => self.normalize(&value, text),
            other => Ok(other.clone()),
        }
    }

    fn demongoize(&self, value: Bson) -> CodecResult {
        Ok(self.mongoize(value.clone()).unwrap_or(value))
    }
}
