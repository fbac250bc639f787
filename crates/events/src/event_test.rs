//! Tests for the telemetry event model

use super::*;

#[test]
fn test_builder_sets_properties() {
    let event = TelemetryEvent::new("vs/core/command")
        .with_property("name", "edit.paste")
        .with_property("count", 3i64);

    assert_eq!(event.name(), "vs/core/command");
    assert_eq!(event.property("name"), Some(&PropertyValue::from("edit.paste")));
    assert_eq!(event.property("count").and_then(PropertyValue::as_integer), Some(3));
    assert!(event.property("missing").is_none());
}

#[test]
fn test_reserved_bag_is_separate() {
    let event = TelemetryEvent::new("e")
        .with_property("k", "user")
        .with_reserved("k", "reserved");

    assert_eq!(event.property("k"), Some(&PropertyValue::from("user")));
    assert_eq!(event.reserved("k"), Some(&PropertyValue::from("reserved")));
}

#[test]
fn test_stamp_posted_is_write_once() {
    let mut event = TelemetryEvent::new("e");
    assert!(event.posted_at().is_none());

    event.stamp_posted();
    let first = event.posted_at().unwrap();

    event.stamp_posted();
    assert_eq!(event.posted_at().unwrap(), first);
}

#[test]
fn test_set_property_replaces() {
    let mut event = TelemetryEvent::new("e");
    event.set_property("k", 1i64);
    event.set_property("k", 2i64);
    assert_eq!(event.property("k").and_then(PropertyValue::as_integer), Some(2));
}

#[test]
fn test_serde_round_trip() {
    let event = TelemetryEvent::new("e").with_property("k", true);
    let json = serde_json::to_string(&event).unwrap();
    let back: TelemetryEvent = serde_json::from_str(&json).unwrap();

    assert_eq!(back.name(), "e");
    assert_eq!(back.property("k").and_then(PropertyValue::as_bool), Some(true));
}
