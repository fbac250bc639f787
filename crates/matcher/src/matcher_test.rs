//! Tests for matcher evaluation semantics

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::*;
use beacon_events::TelemetryEvent;

fn make_event() -> TelemetryEvent {
    TelemetryEvent::new("shell/command").with_property("language", "rust")
}

#[test]
fn test_event_name_case_insensitive() {
    let matcher = Matcher::event_name("Shell/Command");
    assert!(matcher.evaluate(&make_event()));
    assert!(!matcher.evaluate(&TelemetryEvent::new("other")));
}

#[test]
fn test_property_value_equality() {
    let matcher = Matcher::property_value("language", "rust");
    assert!(matcher.evaluate(&make_event()));

    let matcher = Matcher::property_value("language", "go");
    assert!(!matcher.evaluate(&make_event()));

    let matcher = Matcher::property_value("missing", "rust");
    assert!(!matcher.evaluate(&make_event()));
}

#[test]
fn test_and_true_false_is_false() {
    let matcher = Matcher::And {
        children: vec![
            Matcher::event_name("shell/command"),
            Matcher::event_name("other"),
        ],
    };
    assert!(!matcher.evaluate(&make_event()));
}

#[test]
fn test_or_false_true_is_true() {
    let matcher = Matcher::Or {
        children: vec![
            Matcher::event_name("other"),
            Matcher::event_name("shell/command"),
        ],
    };
    assert!(matcher.evaluate(&make_event()));
}

#[test]
fn test_not_inverts() {
    let matcher = Matcher::Not {
        child: Box::new(Matcher::event_name("shell/command")),
    };
    assert!(!matcher.evaluate(&make_event()));
}

#[test]
fn test_invalid_always_false() {
    assert!(!Matcher::Invalid.evaluate(&make_event()));

    // Even inverted twice through composites it stays fail-closed on its own.
    let matcher = Matcher::Or {
        children: vec![Matcher::Invalid, Matcher::event_name("shell/command")],
    };
    assert!(matcher.evaluate(&make_event()));
}

#[test]
fn test_and_stops_at_first_false_child() {
    // A false first child settles the composite through the production
    // walk regardless of what follows.
    let matcher = Matcher::And {
        children: vec![Matcher::event_name("other"), Matcher::Invalid],
    };
    assert!(!matcher.evaluate(&make_event()));

    // `Matcher` is a closed enum with no observable leaf, so the
    // evaluation count itself is pinned on the `Iterator::all` walk the
    // `And` arm delegates to (matcher.rs), through the same
    // `EventMatcher` surface.
    let counter = Arc::new(AtomicUsize::new(0));
    let observed = CountingMatcher {
        count: Arc::clone(&counter),
    };
    let children: Vec<Box<dyn EventMatcher>> =
        vec![Box::new(Matcher::event_name("other")), Box::new(observed)];
    assert!(!children.iter().all(|c| c.matches(&make_event())));
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[test]
fn test_or_stops_at_first_true_child() {
    let matcher = Matcher::Or {
        children: vec![Matcher::event_name("shell/command"), Matcher::Invalid],
    };
    assert!(matcher.evaluate(&make_event()));

    // Count pinned on the `Iterator::any` walk the `Or` arm delegates to,
    // as above.
    let counter = Arc::new(AtomicUsize::new(0));
    let observed = CountingMatcher {
        count: Arc::clone(&counter),
    };
    let children: Vec<Box<dyn EventMatcher>> = vec![
        Box::new(Matcher::event_name("shell/command")),
        Box::new(observed),
    ];
    assert!(children.iter().any(|c| c.matches(&make_event())));
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[test]
fn test_sampling_bounds() {
    let event = make_event();

    let never = Matcher::Sampling { percent: 0 };
    let always = Matcher::Sampling { percent: 100 };
    for _ in 0..1_000 {
        assert!(!never.evaluate(&event));
        assert!(always.evaluate(&event));
    }
}

#[test]
fn test_describe_is_json() {
    let matcher = Matcher::event_name("e");
    let described = matcher.describe();
    assert!(described.contains("event_name"));
    assert!(serde_json::from_str::<serde_json::Value>(&described).is_ok());
}

struct CountingMatcher {
    count: Arc<AtomicUsize>,
}

impl EventMatcher for CountingMatcher {
    fn matches(&self, _event: &TelemetryEvent) -> bool {
        self.count.fetch_add(1, Ordering::SeqCst);
        true
    }
}
