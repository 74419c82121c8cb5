//! Numeric sanitation helpers
//!
//! Every stat value that enters the system passes through here first. The
//! functions are total: bad input degrades to a caller-supplied default and
//! nothing ever yields NaN or an infinity.

use serde_json::Value;

/// Decimal places kept by [`SafeMath`] results
pub const PRECISION_DIGITS: i32 = 10;

const PRECISION_SCALE: f64 = 1e10;

/// Return `value` if it is finite, otherwise `default`
///
/// A non-finite default collapses to `0.0`.
pub fn to_number(value: f64, default: f64) -> f64 {
    if value.is_finite() {
        value
    } else if default.is_finite() {
        default
    } else {
        0.0
    }
}

/// Coerce a loosely typed JSON/TOML value into a finite number
///
/// Accepts numbers and numeric strings (surrounding whitespace ignored).
/// Everything else, including empty strings, is rejected.
pub fn value_to_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Floor a sanitized number and clamp it to `>= 0`
pub fn to_non_negative_int(value: f64, default: u32) -> u32 {
    let n = to_number(value, f64::from(default)).floor();
    n.clamp(0.0, f64::from(u32::MAX)) as u32
}

/// Floor a sanitized number and clamp it to `>= 1`
pub fn to_positive_int(value: f64, default: u32) -> u32 {
    let n = to_number(value, f64::from(default.max(1))).floor();
    n.clamp(1.0, f64::from(u32::MAX)) as u32
}

/// Clamp `value` into `[min, max]`
///
/// Reversed bounds are swapped (logged, not an error). NaN input resolves to
/// the lower bound.
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    let (mut lo, mut hi) = (
        if min.is_nan() { f64::NEG_INFINITY } else { min },
        if max.is_nan() { f64::INFINITY } else { max },
    );
    if lo > hi {
        tracing::warn!("clamp bounds reversed (min {} > max {}), swapping", lo, hi);
        std::mem::swap(&mut lo, &mut hi);
    }
    if value.is_nan() {
        return lo;
    }
    value.clamp(lo, hi)
}

/// Round to [`PRECISION_DIGITS`] decimal places to hide float noise
pub fn round_precision(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let scaled = value * PRECISION_SCALE;
    if !scaled.is_finite() {
        // beyond the range where ten decimals mean anything
        return value;
    }
    scaled.round() / PRECISION_SCALE
}

/// Arithmetic that rounds away floating point noise
///
/// `SafeMath::add(0.1, 0.2) == 0.3` holds exactly.
pub struct SafeMath;

impl SafeMath {
    pub fn add(a: f64, b: f64) -> f64 {
        round_precision(to_number(a, 0.0) + to_number(b, 0.0))
    }

    pub fn subtract(a: f64, b: f64) -> f64 {
        round_precision(to_number(a, 0.0) - to_number(b, 0.0))
    }

    pub fn multiply(a: f64, b: f64) -> f64 {
        round_precision(to_number(a, 0.0) * to_number(b, 0.0))
    }

    /// Divide, returning `default` when the divisor is zero or not finite
    pub fn divide(a: f64, b: f64, default: f64) -> f64 {
        let divisor = to_number(b, 0.0);
        if divisor == 0.0 {
            return to_number(default, 0.0);
        }
        round_precision(to_number(a, 0.0) / divisor)
    }
}

/// `value` as a percentage of `max`, clamped to `[0, 100]`
pub fn percentage(value: f64, max: f64) -> f64 {
    clamp(SafeMath::divide(value, max, 0.0) * 100.0, 0.0, 100.0)
}
