//! Beacon Events
//!
//! Data model for the Beacon client-side telemetry pipeline:
//!
//! - [`TelemetryEvent`] - a named event with user properties and a separate
//!   reserved (diagnostic-only) property bag
//! - [`FaultEvent`] - a crash/fault report with an optional exception and
//!   process-dump reference, carrying the Watson sampling decision
//! - [`PropertyValue`] - the tagged scalar stored in property bags
//!
//! # Ownership
//!
//! An event is owned by the caller until it is posted. After posting, every
//! channel shares the same immutable instance behind an `Arc`; channels never
//! mutate a posted event. The notification path hands subscribers an
//! independent clone.
//!
//! # Example
//!
//! ```
//! use beacon_events::TelemetryEvent;
//!
//! let event = TelemetryEvent::new("editor/file/opened")
//!     .with_property("language", "rust")
//!     .with_property("line_count", 1200i64);
//!
//! assert_eq!(event.name(), "editor/file/opened");
//! ```

mod event;
mod fault;
mod property;

pub use event::TelemetryEvent;
pub use fault::{FaultEvent, WatsonOptIn};
pub use property::PropertyValue;

/// Reserved property keys understood by the pipeline itself.
///
/// Reserved properties are diagnostic-only: they are never presented to
/// matchers as user data, and they let tests and diagnostics override
/// per-event what the channels would otherwise decide.
pub mod reserved {
    /// Override the Watson sample percent (integer, 0-100).
    pub const WATSON_SAMPLE_PERCENT: &str = "reserved.watson.samplepercent";

    /// Override the maximum Watson reports for the process lifetime.
    pub const WATSON_MAX_REPORTS: &str = "reserved.watson.maxreports";

    /// Override the minimum seconds between two Watson reports.
    pub const WATSON_MIN_SECONDS: &str = "reserved.watson.minsecondsbetweenreports";

    /// Provenance of the Watson inclusion decision (written by the gate).
    pub const WATSON_DECISION_SOURCE: &str = "reserved.watson.decisionsource";

    /// Numeric id of the process that produced a pipeline self-fault.
    pub const FAULT_PROCESS_ID: &str = "reserved.fault.processid";

    /// Name of the event that poisoned a dispatcher drain.
    pub const FAULT_SOURCE_EVENT: &str = "reserved.fault.sourceevent";

    /// Serialized form of a matcher that faulted during evaluation.
    pub const FAULT_MATCHER: &str = "reserved.fault.matcher";
}

/// Stable event names for faults emitted by the pipeline about itself.
///
/// Downstream consumers use these to tell pipeline self-faults apart from
/// application faults, so they must never change.
pub mod fault_names {
    /// A subscription matcher faulted during evaluation and was removed.
    pub const MATCHER_FAULT: &str = "beacon/pipeline/matcherfault";

    /// A subscriber handler faulted; the subscription survives.
    pub const HANDLER_FAULT: &str = "beacon/pipeline/subscriberfault";

    /// A dispatched event poisoned a drain pass and was isolated.
    pub const POISON_EVENT: &str = "beacon/pipeline/poisonevent";
}
