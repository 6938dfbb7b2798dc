//! Property values
//!
//! Values are scalars, PII-marked strings, or complex trees that are
//! serialized late in the pipeline (after PII substitution).

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Number, Value};

/// Value of a single event property
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Plain string
    String(String),
    /// Signed integer
    Int(i64),
    /// Floating point number
    Double(f64),
    /// Boolean
    Bool(bool),
    /// Personally identifying string, hashed before leaving the pipeline
    Pii(String),
    /// Structured value, serialized to a string by the pipeline
    Complex(ComplexValue),
}

impl PropertyValue {
    /// Wrap a value in the PII marker
    pub fn pii(value: impl Into<String>) -> Self {
        Self::Pii(value.into())
    }

    /// Wrap a structured value
    pub fn complex(value: ComplexValue) -> Self {
        Self::Complex(value)
    }

    /// String contents, for plain strings only
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this value carries the PII marker
    #[inline]
    pub fn is_pii(&self) -> bool {
        matches!(self, Self::Pii(_))
    }

    /// Whether this value is a complex tree
    #[inline]
    pub fn is_complex(&self) -> bool {
        matches!(self, Self::Complex(_))
    }

    /// Whether this value is a plain scalar (not PII, not complex)
    #[inline]
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::String(_) | Self::Int(_) | Self::Double(_) | Self::Bool(_)
        )
    }

    /// Convert a JSON value into a property value
    ///
    /// Objects and arrays become complex values, `null` becomes an empty string.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Self::String(String::new()),
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Double(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => Self::String(s),
            other => Self::Complex(ComplexValue::from_json(other)),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Double(d) => write!(f, "{d}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Pii(_) => f.write_str("<pii>"),
            Self::Complex(_) => f.write_str("<complex>"),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for PropertyValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<u32> for PropertyValue {
    fn from(i: u32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for PropertyValue {
    fn from(d: f64) -> Self {
        Self::Double(d)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<ComplexValue> for PropertyValue {
    fn from(c: ComplexValue) -> Self {
        Self::Complex(c)
    }
}

/// Structured property value
///
/// Mirrors the JSON data model with one addition: leaves may be PII-marked
/// so that redaction can happen before serialization.
#[derive(Debug, Clone, PartialEq)]
pub enum ComplexValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Pii(String),
    List(Vec<ComplexValue>),
    Map(BTreeMap<String, ComplexValue>),
}

impl ComplexValue {
    /// Build a complex value from JSON (no PII markers)
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from_json).collect()),
            Value::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to JSON, replacing every PII leaf with the output of `pii`
    pub fn to_json_with(&self, pii: &mut dyn FnMut(&str) -> String) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
            Self::Pii(s) => Value::String(pii(s)),
            Self::List(items) => Value::Array(items.iter().map(|i| i.to_json_with(pii)).collect()),
            Self::Map(map) => {
                let mut out = Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), v.to_json_with(pii));
                }
                Value::Object(out)
            }
        }
    }

    /// Whether any leaf carries the PII marker
    pub fn contains_pii(&self) -> bool {
        match self {
            Self::Pii(_) => true,
            Self::List(items) => items.iter().any(Self::contains_pii),
            Self::Map(map) => map.values().any(Self::contains_pii),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_scalars() {
        assert_eq!(PropertyValue::from_json(json!(5)), PropertyValue::Int(5));
        assert_eq!(PropertyValue::from_json(json!(1.5)), PropertyValue::Double(1.5));
        assert_eq!(PropertyValue::from_json(json!(true)), PropertyValue::Bool(true));
        assert_eq!(
            PropertyValue::from_json(json!("x")),
            PropertyValue::String("x".into())
        );
    }

    #[test]
    fn test_from_json_object_is_complex() {
        let value = PropertyValue::from_json(json!({"a": [1, 2]}));
        assert!(value.is_complex());
        assert!(!value.is_scalar());
    }

    #[test]
    fn test_pii_display_does_not_leak() {
        let value = PropertyValue::pii("secret@example.com");
        assert_eq!(value.to_string(), "<pii>");
        assert!(value.is_pii());
    }

    #[test]
    fn test_complex_to_json_substitutes_pii() {
        let mut map = BTreeMap::new();
        map.insert("user".to_string(), ComplexValue::Pii("alice".into()));
        map.insert("count".to_string(), ComplexValue::Number(3.into()));
        let value = ComplexValue::Map(map);

        assert!(value.contains_pii());
        let json = value.to_json_with(&mut |raw| format!("hashed({raw})"));
        assert_eq!(json, json!({"count": 3, "user": "hashed(alice)"}));
    }
}
