//! Property values stored in event property bags.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A tagged scalar value attached to an event property.
///
/// Untagged in the serialized form so the declarative rule files and the
/// on-disk pending format stay plain JSON scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Boolean flag
    Bool(bool),
    /// Signed 64-bit integer
    Integer(i64),
    /// 64-bit float
    Float(f64),
    /// UTF-8 string
    String(String),
}

impl PropertyValue {
    /// Get the value as an integer, if it is one.
    #[inline]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as a bool, if it is one.
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as a string slice, if it is one.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{v}"),
            PropertyValue::Integer(v) => write!(f, "{v}"),
            PropertyValue::Float(v) => write!(f, "{v}"),
            PropertyValue::String(v) => f.write_str(v),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Integer(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        PropertyValue::Integer(v as i64)
    }
}

impl From<u32> for PropertyValue {
    fn from(v: u32) -> Self {
        PropertyValue::Integer(v as i64)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Float(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        assert_eq!(PropertyValue::from(7i64).as_integer(), Some(7));
        assert_eq!(PropertyValue::from(true).as_bool(), Some(true));
        assert_eq!(PropertyValue::from("x").as_str(), Some("x"));
        assert_eq!(PropertyValue::from(1.5).as_integer(), None);
    }

    #[test]
    fn test_serde_scalar_form() {
        let json = serde_json::to_string(&PropertyValue::from(42i64)).unwrap();
        assert_eq!(json, "42");

        let back: PropertyValue = serde_json::from_str("\"hello\"").unwrap();
        assert_eq!(back, PropertyValue::from("hello"));
    }
}
