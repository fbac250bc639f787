//! Seam through which pipeline components re-post events into the
//! owning session.

use beacon_events::{FaultEvent, TelemetryEvent};

/// Posting surface of the owning session.
///
/// The dispatcher and the notification service use this to emit
/// self-describing fault events without depending on the session type.
pub trait EventPoster: Send + Sync {
    /// Post an event into the session fan-out.
    fn post(&self, event: TelemetryEvent);

    /// Post a fault event. The default folds it into a plain event.
    fn post_fault(&self, fault: FaultEvent) {
        self.post(fault.into_event());
    }
}
