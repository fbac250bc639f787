//! Delivery channel metrics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters kept by the delivery channel.
#[derive(Debug, Default)]
pub struct DeliveryMetrics {
    /// Events accepted by `post_event`
    pub events_accepted: AtomicU64,

    /// Events dropped because the staging buffer was full
    pub events_dropped: AtomicU64,

    /// Events durably appended to the pending store
    pub events_persisted: AtomicU64,

    /// Batches sealed and made ready for upload
    pub batches_sealed: AtomicU64,

    /// Batches uploaded and removed
    pub batches_uploaded: AtomicU64,

    /// Failed upload attempts (retried on a later cycle)
    pub upload_failures: AtomicU64,

    /// Storage failures while persisting (events lost)
    pub persist_failures: AtomicU64,
}

impl DeliveryMetrics {
    pub const fn new() -> Self {
        Self {
            events_accepted: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
            events_persisted: AtomicU64::new(0),
            batches_sealed: AtomicU64::new(0),
            batches_uploaded: AtomicU64::new(0),
            upload_failures: AtomicU64::new(0),
            persist_failures: AtomicU64::new(0),
        }
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> DeliverySnapshot {
        DeliverySnapshot {
            events_accepted: self.events_accepted.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            events_persisted: self.events_persisted.load(Ordering::Relaxed),
            batches_sealed: self.batches_sealed.load(Ordering::Relaxed),
            batches_uploaded: self.batches_uploaded.load(Ordering::Relaxed),
            upload_failures: self.upload_failures.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`DeliveryMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliverySnapshot {
    pub events_accepted: u64,
    pub events_dropped: u64,
    pub events_persisted: u64,
    pub batches_sealed: u64,
    pub batches_uploaded: u64,
    pub upload_failures: u64,
    pub persist_failures: u64,
}
