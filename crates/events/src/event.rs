//! Telemetry event type.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::PropertyValue;

/// A named telemetry event with two property bags.
///
/// `properties` is user data and is what matchers evaluate against.
/// `reserved` is diagnostic-only pipeline state (Watson overrides, fault
/// provenance) and is never presented to matchers as user data.
///
/// Built in the builder style:
///
/// ```
/// use beacon_events::TelemetryEvent;
///
/// let event = TelemetryEvent::new("shell/command")
///     .with_property("command", "build")
///     .with_property("elapsed_ms", 420i64);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    name: String,
    #[serde(default)]
    properties: HashMap<String, PropertyValue>,
    #[serde(default)]
    reserved: HashMap<String, PropertyValue>,
    #[serde(default)]
    posted_at: Option<DateTime<Utc>>,
}

impl TelemetryEvent {
    /// Create a new event with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: HashMap::new(),
            reserved: HashMap::new(),
            posted_at: None,
        }
    }

    /// Event name. Compared case-insensitively by matchers.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builder-style property setter.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.set_property(key, value);
        self
    }

    /// Set a user property, replacing any previous value.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Look up a user property.
    #[inline]
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// User property bag.
    #[inline]
    pub fn properties(&self) -> &HashMap<String, PropertyValue> {
        &self.properties
    }

    /// Set a reserved (diagnostic-only) property.
    pub fn set_reserved(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        self.reserved.insert(key.into(), value.into());
    }

    /// Builder-style reserved property setter.
    pub fn with_reserved(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.set_reserved(key, value);
        self
    }

    /// Look up a reserved property.
    #[inline]
    pub fn reserved(&self, key: &str) -> Option<&PropertyValue> {
        self.reserved.get(key)
    }

    /// Reserved property interpreted as an integer.
    pub fn reserved_integer(&self, key: &str) -> Option<i64> {
        self.reserved.get(key).and_then(PropertyValue::as_integer)
    }

    /// Timestamp stamped by the owning session when the event was posted.
    #[inline]
    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        self.posted_at
    }

    /// Stamp the post timestamp. Called once by the session; later calls
    /// keep the original stamp.
    pub fn stamp_posted(&mut self) {
        if self.posted_at.is_none() {
            self.posted_at = Some(Utc::now());
        }
    }
}

#[cfg(test)]
#[path = "event_test.rs"]
mod event_test;
