//! Tests for the tap point

use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;

#[test]
fn test_tap_is_noop_without_attachments() {
    let tap = TapPoint::new();
    let event = Arc::new(TelemetryEvent::new("e"));

    tap.tap(&event);
    assert_eq!(tap.events_tapped(), 0);
}

#[test]
fn test_attached_callback_observes_events() {
    let tap = TapPoint::new();
    let seen = Arc::new(AtomicUsize::new(0));

    let seen_cb = Arc::clone(&seen);
    let id = tap.attach(Arc::new(move |_| {
        seen_cb.fetch_add(1, Ordering::SeqCst);
    }));
    assert!(tap.has_taps());

    let event = Arc::new(TelemetryEvent::new("e"));
    tap.tap(&event);
    tap.tap(&event);
    assert_eq!(seen.load(Ordering::SeqCst), 2);

    tap.detach(id);
    assert!(!tap.has_taps());

    tap.tap(&event);
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[test]
fn test_detach_unknown_id_is_ignored() {
    let tap = TapPoint::new();
    tap.detach(42);
    assert_eq!(tap.tap_count(), 0);
}

#[test]
fn test_multiple_taps_all_observe() {
    let tap = TapPoint::new();
    let a = Arc::new(AtomicUsize::new(0));
    let b = Arc::new(AtomicUsize::new(0));

    let a_cb = Arc::clone(&a);
    tap.attach(Arc::new(move |_| {
        a_cb.fetch_add(1, Ordering::SeqCst);
    }));
    let b_cb = Arc::clone(&b);
    tap.attach(Arc::new(move |_| {
        b_cb.fetch_add(1, Ordering::SeqCst);
    }));

    tap.tap(&Arc::new(TelemetryEvent::new("e")));
    assert_eq!(a.load(Ordering::SeqCst), 1);
    assert_eq!(b.load(Ordering::SeqCst), 1);
}
