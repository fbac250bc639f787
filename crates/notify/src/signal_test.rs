use std::sync::Arc;
use std::time::Duration;

use super::*;

#[tokio::test]
async fn wait_returns_immediately_when_already_set() {
    let signal = ManualResetSignal::new();
    signal.set();
    tokio::time::timeout(Duration::from_secs(1), signal.wait())
        .await
        .unwrap();
}

#[tokio::test]
async fn set_wakes_a_pending_waiter() {
    let signal = Arc::new(ManualResetSignal::new());
    let waiter = {
        let signal = signal.clone();
        tokio::spawn(async move { signal.wait().await })
    };
    tokio::task::yield_now().await;
    signal.set();
    tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn reset_rearms_the_signal() {
    let signal = ManualResetSignal::new();
    signal.set();
    assert!(signal.is_set());
    signal.reset();
    assert!(!signal.is_set());

    // A wait after reset must block until the next set.
    let blocked =
        tokio::time::timeout(Duration::from_millis(50), signal.wait()).await;
    assert!(blocked.is_err());

    signal.set();
    tokio::time::timeout(Duration::from_secs(1), signal.wait())
        .await
        .unwrap();
}

#[tokio::test]
async fn set_after_reset_is_observed() {
    let signal = ManualResetSignal::new();
    signal.set();
    signal.reset();
    signal.set();
    assert!(signal.is_set());
}

#[tokio::test]
async fn wakes_multiple_waiters() {
    let signal = Arc::new(ManualResetSignal::new());
    let mut waiters = Vec::new();
    for _ in 0..4 {
        let signal = signal.clone();
        waiters.push(tokio::spawn(async move { signal.wait().await }));
    }
    tokio::task::yield_now().await;
    signal.set();
    for waiter in waiters {
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
