//! Fault (crash report) event type.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{reserved, PropertyValue, TelemetryEvent};

/// User opt-in state for Watson crash reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WatsonOptIn {
    /// No explicit choice recorded on the event
    #[default]
    Unspecified,
    /// A property on the event opted the report in
    PropertyOptIn,
    /// A property on the event opted the report out
    PropertyOptOut,
}

/// A fault event: a [`TelemetryEvent`] variant carrying an optional
/// exception description, an optional process-dump reference, and the
/// Watson sampling decision.
///
/// The inclusion decision is write-once-effectively: once set, a later
/// evaluation respects it and only records provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultEvent {
    event: TelemetryEvent,
    exception: Option<String>,
    dump: Option<PathBuf>,
    is_included_in_watson_sample: Option<bool>,
    user_opt_in: WatsonOptIn,
}

impl FaultEvent {
    /// Create a fault event with the given event name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            event: TelemetryEvent::new(name),
            exception: None,
            dump: None,
            is_included_in_watson_sample: None,
            user_opt_in: WatsonOptIn::Unspecified,
        }
    }

    /// Create a fault describing a pipeline self-fault, tagged with the
    /// current process id so a dump can be correlated later.
    pub fn for_current_process(name: impl Into<String>) -> Self {
        let mut fault = Self::new(name);
        fault
            .event
            .set_reserved(reserved::FAULT_PROCESS_ID, std::process::id());
        fault
    }

    /// Attach an exception description.
    pub fn with_exception(mut self, description: impl Into<String>) -> Self {
        self.exception = Some(description.into());
        self
    }

    /// Attach a process-dump reference.
    pub fn with_dump(mut self, path: impl Into<PathBuf>) -> Self {
        self.dump = Some(path.into());
        self
    }

    /// Set the user opt-in state read from event properties.
    pub fn with_opt_in(mut self, opt_in: WatsonOptIn) -> Self {
        self.user_opt_in = opt_in;
        self
    }

    /// Builder-style user property setter on the underlying event.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.event.set_property(key, value);
        self
    }

    /// Builder-style reserved property setter on the underlying event.
    pub fn with_reserved(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.event.set_reserved(key, value);
        self
    }

    /// The underlying telemetry event.
    #[inline]
    pub fn event(&self) -> &TelemetryEvent {
        &self.event
    }

    /// Mutable access to the underlying telemetry event.
    #[inline]
    pub fn event_mut(&mut self) -> &mut TelemetryEvent {
        &mut self.event
    }

    /// Exception description, if any.
    #[inline]
    pub fn exception(&self) -> Option<&str> {
        self.exception.as_deref()
    }

    /// Process-dump reference, if any.
    #[inline]
    pub fn dump(&self) -> Option<&Path> {
        self.dump.as_deref()
    }

    /// Watson inclusion decision, `None` until evaluated.
    #[inline]
    pub fn is_included_in_watson_sample(&self) -> Option<bool> {
        self.is_included_in_watson_sample
    }

    /// User opt-in state.
    #[inline]
    pub fn user_opt_in(&self) -> WatsonOptIn {
        self.user_opt_in
    }

    /// Record the Watson inclusion decision.
    ///
    /// The first decision wins: if one is already present only the
    /// provenance annotation is written.
    pub fn record_sample_decision(&mut self, included: bool, source: &str) {
        if self.is_included_in_watson_sample.is_none() {
            self.is_included_in_watson_sample = Some(included);
        }
        self.event
            .set_reserved(reserved::WATSON_DECISION_SOURCE, source);
    }

    /// Fold the fault-specific fields into the underlying event and return
    /// it, ready for posting through the session.
    pub fn into_event(mut self) -> TelemetryEvent {
        if let Some(exception) = self.exception {
            self.event.set_property("fault.exception", exception);
        }
        if let Some(dump) = self.dump {
            self.event
                .set_property("fault.dump", dump.display().to_string());
        }
        if let Some(included) = self.is_included_in_watson_sample {
            self.event.set_property("fault.watsonincluded", included);
        }
        self.event
    }
}

#[cfg(test)]
#[path = "fault_test.rs"]
mod fault_test;
