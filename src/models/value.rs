//! Dynamically typed box values.

use std::collections::BTreeMap;

use serde_json::Number;
use serde_json::Value;

/// User data of a box. Ordered so that encoding is canonical.
pub type ValueMap = BTreeMap<String, Value>;

/// The tag of a stored [`Value`], as reported by `get_type`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum ValueType {
    Null,
    Bool,
    Number,
    String,
    Sequence,
    Mapping,
}

impl From<&Value> for ValueType {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::Number(_) => ValueType::Number,
            Value::String(_) => ValueType::String,
            Value::Array(_) => ValueType::Sequence,
            Value::Object(_) => ValueType::Mapping,
        }
    }
}

/// Adds two numbers, staying integral when both operands are.
///
/// Falls back to floating point on integer overflow or mixed operands.
/// Returns `None` only if the float result is not finite.
pub(crate) fn add_numbers(a: &Number, b: &Number) -> Option<Number> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Some(sum.into());
        }
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        if let Some(sum) = x.checked_add(y) {
            return Some(sum.into());
        }
    }
    Number::from_f64(a.as_f64()? + b.as_f64()?)
}

/// Negation used by `decrement`.
pub(crate) fn negate_number(n: &Number) -> Option<Number> {
    if let Some(x) = n.as_i64() {
        if let Some(neg) = x.checked_neg() {
            return Some(neg.into());
        }
    }
    Number::from_f64(-n.as_f64()?)
}

/// Numeric ordering of two numbers, as floats.
pub(crate) fn compare_numbers(a: &Number, b: &Number) -> Option<std::cmp::Ordering> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return Some(x.cmp(&y));
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return Some(x.cmp(&y));
    }
    a.as_f64()?.partial_cmp(&b.as_f64()?)
}
