// =============================================================================
// Numeric coercion for loosely-typed provider values
// =============================================================================
//
// The candle API is inconsistent about numeric types: prices arrive as JSON
// numbers, numeric strings ("0E-8", " 101.5 "), empty strings or null.  Every
// price read goes through `coerce_f64`, which never fails loudly: it returns
// `None` for anything that is not a finite number.
// =============================================================================

use serde_json::Value;

/// Convert an arbitrary JSON value into a finite `f64`.
///
/// - numbers are taken as-is
/// - strings are trimmed and parsed (scientific notation included)
/// - null, empty strings, booleans, arrays, objects and garbage => `None`
/// - NaN / infinity (numeric or spelled out) => `None`
pub fn coerce_f64(val: &Value) -> Option<f64> {
    let parsed = match val {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        _ => None,
    }?;

    parsed.is_finite().then_some(parsed)
}

/// Same as [`coerce_f64`] but for an optional field lookup.
pub fn coerce_field(val: Option<&Value>) -> Option<f64> {
    val.and_then(coerce_f64)
}
