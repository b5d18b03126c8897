//! Type-aware value coercion, applied to both sides before comparison and to
//! every value before it is written.

use crate::model::Value;
use crate::policy::TypeConstraint;

/// Sheet display format applied to currency cells (two decimals, currency symbol).
pub const CURRENCY_FORMAT: &str = ",,,,,,,,,,,13,0,1,2,,";

const TRUE_WORDS: &[&str] = &["true", "1", "yes", "y", "on", "checked"];
const FALSE_WORDS: &[&str] = &["false", "0", "no", "n", "off", "unchecked"];

/// Canonical form of `value` under `constraint`.
///
/// Empty text is treated as null everywhere, so a blank sheet cell and a SQL
/// `''` or `NULL` are the same value.
pub fn normalize(constraint: TypeConstraint, value: &Value) -> Value {
    if let Value::Text(s) = value {
        if s.is_empty() {
            return normalize(constraint, &Value::Null);
        }
    }
    match constraint {
        TypeConstraint::None => value.clone(),
        TypeConstraint::Currency => currency(value),
        TypeConstraint::Checkbox => checkbox(value),
    }
}

/// Whether two raw values are equal once normalized.
pub fn values_match(constraint: TypeConstraint, a: &Value, b: &Value) -> bool {
    normalize(constraint, a) == normalize(constraint, b)
}

/// Whether the sheet should validate writes to this column strictly.
pub fn strict_for(constraint: TypeConstraint) -> bool {
    constraint == TypeConstraint::None
}

fn currency(value: &Value) -> Value {
    let amount = match value {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        Value::Text(s) => match s.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => f,
            _ => return value.clone(),
        },
        Value::Null | Value::Bool(_) => return value.clone(),
    };
    // -0.0 would otherwise render as "-0.00"
    let amount = if amount == 0.0 { 0.0 } else { amount };
    Value::Text(format!("{amount:.2}"))
}

fn checkbox(value: &Value) -> Value {
    let checked = match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::Text(s) => {
            let lower = s.trim().to_ascii_lowercase();
            if TRUE_WORDS.contains(&lower.as_str()) {
                true
            } else if FALSE_WORDS.contains(&lower.as_str()) {
                false
            } else {
                return value.clone();
            }
        }
    };
    Value::Text(checked.to_string())
}
