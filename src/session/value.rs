//! Decoded script values.
//!
//! `Runtime.evaluate` results are polymorphic; [`ScriptValue`] gives
//! them an explicit tagged representation so the recursive
//! property-fetch in evaluation stays well-typed.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Value;

// ============================================================================
// ScriptValue
// ============================================================================

/// A value produced by in-page script evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    /// `null` or `undefined`.
    Null,
    /// A boolean.
    Bool(bool),
    /// Any number; integers are represented exactly up to 2^53.
    Number(f64),
    /// A string.
    String(String),
    /// An array, fetched element by element.
    Array(Vec<ScriptValue>),
    /// A plain object, fetched property by property.
    Object(BTreeMap<String, ScriptValue>),
}

impl ScriptValue {
    /// Converts a plain JSON value (a primitive carried inline in a
    /// protocol result) into a script value.
    #[must_use]
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from_json).collect()),
            Value::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Returns `true` if this is `Null`.
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the boolean value, if this is a boolean.
    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the numeric value, if this is a number.
    #[inline]
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the integral value, if this is a whole number.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
            _ => None,
        }
    }

    /// Returns the string slice, if this is a string.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Javascript truthiness of the value.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Array(_) | Self::Object(_) => true,
        }
    }
}

impl From<ScriptValue> for Value {
    fn from(value: ScriptValue) -> Self {
        match value {
            ScriptValue::Null => Value::Null,
            ScriptValue::Bool(b) => Value::Bool(b),
            ScriptValue::Number(n) => serde_json::Number::from_f64(n)
                .map_or(Value::Null, Value::Number),
            ScriptValue::String(s) => Value::String(s),
            ScriptValue::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            ScriptValue::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_from_json_primitives() {
        assert_eq!(ScriptValue::from_json(json!(null)), ScriptValue::Null);
        assert_eq!(ScriptValue::from_json(json!(true)), ScriptValue::Bool(true));
        assert_eq!(ScriptValue::from_json(json!(5)), ScriptValue::Number(5.0));
        assert_eq!(
            ScriptValue::from_json(json!("hi")),
            ScriptValue::String("hi".into())
        );
    }

    #[test]
    fn test_accessors() {
        assert!(ScriptValue::Null.is_null());
        assert_eq!(ScriptValue::Bool(true).as_bool(), Some(true));
        assert_eq!(ScriptValue::Number(5.0).as_i64(), Some(5));
        assert_eq!(ScriptValue::Number(5.5).as_i64(), None);
        assert_eq!(ScriptValue::String("x".into()).as_str(), Some("x"));
        assert_eq!(ScriptValue::Number(1.5).as_f64(), Some(1.5));
    }

    #[test]
    fn test_truthiness() {
        assert!(!ScriptValue::Null.is_truthy());
        assert!(!ScriptValue::Bool(false).is_truthy());
        assert!(!ScriptValue::Number(0.0).is_truthy());
        assert!(!ScriptValue::Number(f64::NAN).is_truthy());
        assert!(!ScriptValue::String(String::new()).is_truthy());
        assert!(ScriptValue::Number(-1.0).is_truthy());
        assert!(ScriptValue::String("0".into()).is_truthy());
        assert!(ScriptValue::Array(vec![]).is_truthy());
        assert!(ScriptValue::Object(BTreeMap::new()).is_truthy());
    }

    #[test]
    fn test_into_json_roundtrip() {
        let value = ScriptValue::from_json(json!({"a": [1, "two", null], "b": {"c": true}}));
        let json: Value = value.into();
        assert_eq!(json, json!({"a": [1.0, "two", null], "b": {"c": true}}));
    }
}
