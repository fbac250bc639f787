//! Fail-closed parsing of declarative matcher rules.
//!
//! Rule files arrive as JSON. A node that cannot be understood becomes
//! [`Matcher::Invalid`] in place, leaving well-formed siblings intact.

use serde_json::Value;

use beacon_events::PropertyValue;

use crate::Matcher;

impl Matcher {
    /// Parse a declarative rule from a JSON string.
    ///
    /// Never errors: unparseable input yields [`Matcher::Invalid`].
    pub fn from_json(input: &str) -> Matcher {
        match serde_json::from_str::<Value>(input) {
            Ok(value) => Matcher::from_value(&value),
            Err(_) => Matcher::Invalid,
        }
    }

    /// Parse a declarative rule from a JSON value.
    ///
    /// Malformed composite children degrade to [`Matcher::Invalid`]
    /// individually; the rest of the tree is preserved.
    pub fn from_value(value: &Value) -> Matcher {
        let Some(kind) = value.get("kind").and_then(Value::as_str) else {
            return Matcher::Invalid;
        };

        match kind {
            "event_name" => match value.get("name").and_then(Value::as_str) {
                Some(name) => Matcher::event_name(name),
                None => Matcher::Invalid,
            },
            "property_value" => {
                let key = value.get("key").and_then(Value::as_str);
                let expected = value.get("value").and_then(scalar_value);
                match (key, expected) {
                    (Some(key), Some(expected)) => Matcher::PropertyValue {
                        key: key.to_string(),
                        value: expected,
                    },
                    _ => Matcher::Invalid,
                }
            }
            "and" => match value.get("children").and_then(Value::as_array) {
                Some(children) => Matcher::And {
                    children: children.iter().map(Matcher::from_value).collect(),
                },
                None => Matcher::Invalid,
            },
            "or" => match value.get("children").and_then(Value::as_array) {
                Some(children) => Matcher::Or {
                    children: children.iter().map(Matcher::from_value).collect(),
                },
                None => Matcher::Invalid,
            },
            "not" => match value.get("child") {
                Some(child) => Matcher::Not {
                    child: Box::new(Matcher::from_value(child)),
                },
                None => Matcher::Invalid,
            },
            "sampling" => match value.get("percent").and_then(Value::as_u64) {
                Some(percent) if percent <= 100 => Matcher::Sampling {
                    percent: percent as u8,
                },
                _ => Matcher::Invalid,
            },
            _ => Matcher::Invalid,
        }
    }
}

/// Map a JSON scalar onto a property value. Objects and arrays are not
/// valid property values.
fn scalar_value(value: &Value) -> Option<PropertyValue> {
    match value {
        Value::Bool(b) => Some(PropertyValue::Bool(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(PropertyValue::Integer(i))
            } else {
                n.as_f64().map(PropertyValue::Float)
            }
        }
        Value::String(s) => Some(PropertyValue::String(s.clone())),
        _ => None,
    }
}

#[cfg(test)]
#[path = "parse_test.rs"]
mod parse_test;
