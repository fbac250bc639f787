//! Tests for the lifecycle state machine

use super::*;

#[test]
fn test_start_at_most_once() {
    let lifecycle = Lifecycle::new();
    assert!(!lifecycle.is_started());

    lifecycle.begin_start().unwrap();
    assert!(lifecycle.is_started());

    assert!(matches!(
        lifecycle.begin_start(),
        Err(ChannelError::AlreadyStarted)
    ));
}

#[test]
fn test_require_started_before_start() {
    let lifecycle = Lifecycle::new();
    assert!(matches!(
        lifecycle.require_started(),
        Err(ChannelError::NotStarted)
    ));

    lifecycle.begin_start().unwrap();
    assert!(lifecycle.require_started().is_ok());
}

#[test]
fn test_dispose_runs_once() {
    let lifecycle = Lifecycle::new();
    lifecycle.begin_start().unwrap();

    assert!(lifecycle.mark_disposed());
    assert!(!lifecycle.mark_disposed());
    assert!(lifecycle.is_disposed());
    assert!(!lifecycle.is_started());
}

#[test]
fn test_start_after_dispose_fails() {
    let lifecycle = Lifecycle::new();
    lifecycle.mark_disposed();

    assert!(matches!(
        lifecycle.begin_start(),
        Err(ChannelError::Disposed)
    ));
}

#[test]
fn test_concurrent_start_wins_once() {
    use std::sync::Arc;

    let lifecycle = Arc::new(Lifecycle::new());
    let mut handles = Vec::new();
    for _ in 0..8 {
        let lifecycle = Arc::clone(&lifecycle);
        handles.push(std::thread::spawn(move || lifecycle.begin_start().is_ok()));
    }

    let wins = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(wins, 1);
}
