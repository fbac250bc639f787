//! Tests for fail-closed declarative parsing

use super::*;
use crate::Matcher;
use beacon_events::TelemetryEvent;

#[test]
fn test_parse_event_name() {
    let matcher = Matcher::from_json(r#"{"kind": "event_name", "name": "shell/command"}"#);
    assert_eq!(matcher, Matcher::event_name("shell/command"));
}

#[test]
fn test_parse_property_value_scalars() {
    let matcher =
        Matcher::from_json(r#"{"kind": "property_value", "key": "count", "value": 3}"#);
    assert_eq!(matcher, Matcher::property_value("count", 3i64));

    let matcher =
        Matcher::from_json(r#"{"kind": "property_value", "key": "flag", "value": true}"#);
    assert_eq!(matcher, Matcher::property_value("flag", true));
}

#[test]
fn test_parse_composites() {
    let matcher = Matcher::from_json(
        r#"{"kind": "not", "child": {"kind": "or", "children": [
            {"kind": "event_name", "name": "a"},
            {"kind": "sampling", "percent": 50}
        ]}}"#,
    );

    match matcher {
        Matcher::Not { child } => match *child {
            Matcher::Or { ref children } => assert_eq!(children.len(), 2),
            other => panic!("expected Or, got {other:?}"),
        },
        other => panic!("expected Not, got {other:?}"),
    }
}

#[test]
fn test_unrecognized_kind_is_invalid() {
    let matcher = Matcher::from_json(r#"{"kind": "regex", "pattern": ".*"}"#);
    assert_eq!(matcher, Matcher::Invalid);
    assert!(!matcher.evaluate(&TelemetryEvent::new("anything")));
}

#[test]
fn test_garbage_input_is_invalid() {
    assert_eq!(Matcher::from_json("not json at all"), Matcher::Invalid);
    assert_eq!(Matcher::from_json("[]"), Matcher::Invalid);
    assert_eq!(Matcher::from_json("{}"), Matcher::Invalid);
}

#[test]
fn test_bad_child_does_not_abort_rule_set() {
    // One malformed child degrades to Invalid in place; the good sibling
    // still matches under Or.
    let matcher = Matcher::from_json(
        r#"{"kind": "or", "children": [
            {"kind": "bogus"},
            {"kind": "event_name", "name": "shell/command"}
        ]}"#,
    );

    match &matcher {
        Matcher::Or { children } => {
            assert_eq!(children[0], Matcher::Invalid);
            assert_eq!(children[1], Matcher::event_name("shell/command"));
        }
        other => panic!("expected Or, got {other:?}"),
    }

    assert!(matcher.evaluate(&TelemetryEvent::new("shell/command")));
}

#[test]
fn test_sampling_out_of_range_is_invalid() {
    assert_eq!(
        Matcher::from_json(r#"{"kind": "sampling", "percent": 101}"#),
        Matcher::Invalid
    );
    assert_eq!(
        Matcher::from_json(r#"{"kind": "sampling", "percent": -1}"#),
        Matcher::Invalid
    );
}

#[test]
fn test_non_scalar_property_value_is_invalid() {
    assert_eq!(
        Matcher::from_json(r#"{"kind": "property_value", "key": "k", "value": {"a": 1}}"#),
        Matcher::Invalid
    );
}
