//! Beacon Session
//!
//! The front door of the Beacon client-side telemetry pipeline:
//! [`TelemetrySession`] owns the channel set, the live-stream tap point
//! and the telemetry opt-in flag shared with the Watson gate.
//!
//! # Posting contract
//!
//! `post_event` never blocks and never surfaces channel errors: the
//! event is timestamped once, shared behind an `Arc`, fanned out to
//! every started channel the session context admits, and then tapped
//! for stream observers. Lifecycle contract violations (a second
//! `start`) surface synchronously.
//!
//! # Example
//!
//! ```no_run
//! use beacon_events::TelemetryEvent;
//! use beacon_session::{SessionConfig, TelemetrySession};
//!
//! let session = TelemetrySession::new(SessionConfig::new("session-1"));
//! session.start().unwrap();
//! session.post_event(TelemetryEvent::new("app/started"));
//! ```

mod error;
mod session;

pub use error::{Result, SessionError};
pub use session::{SessionConfig, TelemetrySession};
