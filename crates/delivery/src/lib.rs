//! Beacon Delivery
//!
//! Persisted delivery channel for the Beacon client-side telemetry
//! pipeline:
//!
//! - [`DeliveryChannel`] - transport fallback (native service or direct
//!   HTTPS), bounded staging, background sender
//! - [`PendingStore`] - durable JSON-lines pending queue, one folder per
//!   instrumentation key, guarded by a cross-process advisory lock
//! - [`NativeTransport`] - seam for a preferred host telemetry service
//! - legacy discovery ([`stray_pending_files`]) of stray pending files
//!   left behind by other installers
//!
//! # Durability
//!
//! On the HTTPS path an accepted event is flushed to disk before it
//! counts as delivered to the channel boundary, so a process crash
//! between "accepted" and "sent" loses nothing that reached the store.
//! Upload failures are retried silently; `post_event` never sees them.

mod channel;
mod discovery;
mod error;
mod metrics;
mod store;
mod transport;

pub mod endpoint;

pub use channel::{
    DeliveryChannel, DeliveryConfig, DeliveryProcessor, DEFAULT_SEND_INTERVAL,
    DEFAULT_STAGING_CAPACITY, DELIVERY_CHANNEL_ID,
};
pub use discovery::{stray_pending_files, stray_pending_files_in, wants_eager_start};
pub use error::{DeliveryError, Result};
pub use metrics::{DeliveryMetrics, DeliverySnapshot};
pub use store::{DirLock, PendingStore, PENDING_EXTENSION};
pub use transport::NativeTransport;
