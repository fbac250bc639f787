//! Re-armable async wait/signal primitive.
//!
//! A manual-reset-event-like object used to wake the dispatch loop. The
//! `reset` is a compare-and-swap so a `set` racing a `reset` is never
//! lost: either the reset observes the set and clears it (the caller then
//! drains the queue the set announced), or the set lands after the reset
//! and the next `wait` returns immediately.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Async manual-reset signal with `wait`, `set` and a race-safe `reset`.
#[derive(Debug, Default)]
pub struct ManualResetSignal {
    state: AtomicBool,
    notify: Notify,
}

impl ManualResetSignal {
    /// New signal in the unset state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the signal is currently set.
    #[inline]
    pub fn is_set(&self) -> bool {
        self.state.load(Ordering::Acquire)
    }

    /// Set the signal, waking all current waiters.
    pub fn set(&self) {
        if !self.state.swap(true, Ordering::AcqRel) {
            self.notify.notify_waiters();
        }
    }

    /// Clear the signal if it is set.
    ///
    /// A `set` that lands concurrently is never lost: it either gets
    /// cleared here (and the caller is expected to act on it by draining)
    /// or survives for the next `wait`.
    pub fn reset(&self) {
        loop {
            match self.state.compare_exchange_weak(
                true,
                false,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                // Never set; nothing to clear.
                Err(false) => return,
                // Spurious failure while set; retry.
                Err(true) => continue,
            }
        }
    }

    /// Wait until the signal is set.
    ///
    /// Registers a waiter before re-checking the state so a `set` between
    /// the check and the await cannot be missed.
    pub async fn wait(&self) {
        loop {
            if self.state.load(Ordering::Acquire) {
                return;
            }
            let notified = self.notify.notified();
            if self.state.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
#[path = "signal_test.rs"]
mod signal_test;
