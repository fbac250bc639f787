//! TapPoint - attachment point for observers of the live event stream.
//!
//! The session taps every posted event through here. The inline
//! has-taps check keeps posting free when nothing is listening.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use beacon_events::TelemetryEvent;

/// Callback invoked for every tapped event.
pub type TapCallback = Arc<dyn Fn(&Arc<TelemetryEvent>) + Send + Sync>;

/// The broadcast point between the posting hot path and stream observers.
#[derive(Default)]
pub struct TapPoint {
    /// Attached tap callbacks with their ids
    taps: RwLock<Vec<(u64, TapCallback)>>,
    /// Id source for attachments
    next_id: AtomicU64,
    /// Quick check flag for the hot path
    has_taps: AtomicBool,
    /// Total events tapped while at least one tap was attached
    tap_count: AtomicU64,
}

impl TapPoint {
    /// Create a new tap point with no attachments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a tap callback. Returns the attachment id.
    pub fn attach(&self, callback: TapCallback) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut taps = self.taps.write();
        taps.push((id, callback));
        self.has_taps.store(true, Ordering::Release);
        debug!(id, count = taps.len(), "tap attached");
        id
    }

    /// Detach a tap by id. Unknown ids are ignored.
    pub fn detach(&self, id: u64) {
        let mut taps = self.taps.write();
        taps.retain(|(tap_id, _)| *tap_id != id);
        if taps.is_empty() {
            self.has_taps.store(false, Ordering::Release);
        }
        debug!(id, count = taps.len(), "tap detached");
    }

    /// Whether any tap is attached.
    #[inline]
    pub fn has_taps(&self) -> bool {
        self.has_taps.load(Ordering::Acquire)
    }

    /// Number of attached taps.
    pub fn tap_count(&self) -> usize {
        self.taps.read().len()
    }

    /// Total events observed by the tap point.
    pub fn events_tapped(&self) -> u64 {
        self.tap_count.load(Ordering::Relaxed)
    }

    /// Tap an event. This is the hot path - a no-op when nothing listens.
    #[inline]
    pub fn tap(&self, event: &Arc<TelemetryEvent>) {
        if !self.has_taps.load(Ordering::Acquire) {
            return;
        }

        self.tap_count.fetch_add(1, Ordering::Relaxed);

        let taps = self.taps.read();
        for (_, callback) in taps.iter() {
            callback(event);
        }
        trace!(taps = taps.len(), event = event.name(), "event tapped");
    }
}

impl std::fmt::Debug for TapPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapPoint")
            .field("tap_count", &self.tap_count())
            .field("events_tapped", &self.events_tapped())
            .finish()
    }
}

#[cfg(test)]
#[path = "tap_test.rs"]
mod tap_test;
