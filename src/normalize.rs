//! Numeric normalization for records read from the durable store.
//!
//! Stores may hand numbers back as arbitrary-precision decimal text. Before a
//! record reaches the verifier every number is narrowed to the smallest
//! fitting machine type: an integer when the value has no fractional part,
//! floating point otherwise. `5` and `5.0` both become `5`; `5.5` stays `5.5`.

use crate::error::{Error, Result};
use serde_json::{Number, Value};

/// Largest float that converts to `i64` without saturating.
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

/// Parse a decimal string into the narrowest JSON number.
///
/// # Errors
///
/// Returns [`Error::Store`] if the text is not a finite decimal number.
pub fn normalize_decimal(text: &str) -> Result<Number> {
    let trimmed = text.trim();

    if let Ok(int) = trimmed.parse::<i64>() {
        return Ok(Number::from(int));
    }

    let float: f64 = trimmed
        .parse()
        .map_err(|_| Error::Store(format!("Malformed numeric value: {text:?}")))?;

    narrow_float(float)
        .ok_or_else(|| Error::Store(format!("Numeric value out of range: {text:?}")))
}

/// Narrow every number in a JSON tree.
///
/// Integral floats within `i64` range become integers; everything else is
/// returned unchanged. Total over all inputs.
#[must_use]
pub fn normalize_value(value: Value) -> Value {
    match value {
        Value::Number(number) => Value::Number(normalize_number(number)),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_value).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, normalize_value(value)))
                .collect(),
        ),
        other => other,
    }
}

fn normalize_number(number: Number) -> Number {
    if number.is_i64() || number.is_u64() {
        return number;
    }
    number
        .as_f64()
        .and_then(narrow_float)
        .unwrap_or(number)
}

#[allow(clippy::cast_possible_truncation)]
fn narrow_float(float: f64) -> Option<Number> {
    if !float.is_finite() {
        return None;
    }
    if float.fract() == 0.0 && float >= -I64_UPPER && float < I64_UPPER {
        // Integral and in range, so the cast is exact.
        return Some(Number::from(float as i64));
    }
    Number::from_f64(float)
}
