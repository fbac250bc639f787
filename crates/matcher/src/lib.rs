//! Beacon Matcher
//!
//! A declaratively-built boolean expression tree evaluated against a
//! [`TelemetryEvent`](beacon_events::TelemetryEvent). Used by both the
//! notification service (subscription filtering) and rule-driven routing.
//!
//! # Design
//!
//! The matcher kinds are fixed and enumerable, so [`Matcher`] is a closed
//! sum type with an exhaustive evaluator rather than an open trait
//! hierarchy. Trees are built once and evaluated many times with no shared
//! mutable state between evaluations.
//!
//! # Fail-closed parsing
//!
//! Declarative input that is unrecognized or malformed parses to the
//! explicit [`Matcher::Invalid`] leaf, which always evaluates to false.
//! Parsing never errors for a single bad rule, so one malformed rule cannot
//! abort processing of an entire rule set.
//!
//! ```
//! use beacon_matcher::Matcher;
//! use beacon_events::TelemetryEvent;
//!
//! let matcher = Matcher::from_json(
//!     r#"{"kind": "event_name", "name": "shell/command"}"#,
//! );
//! assert!(matcher.evaluate(&TelemetryEvent::new("shell/command")));
//! ```

mod matcher;
mod parse;

pub use matcher::{EventMatcher, Matcher};
