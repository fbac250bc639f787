//! The matcher tree and its evaluator.

use rand::Rng;
use serde::{Deserialize, Serialize};

use beacon_events::{PropertyValue, TelemetryEvent};

/// Predicate seam used by the notification service.
///
/// [`Matcher`] is the main implementation; tests and callers with custom
/// filtering needs can provide their own.
pub trait EventMatcher: Send + Sync + 'static {
    /// Evaluate the predicate against an event.
    fn matches(&self, event: &TelemetryEvent) -> bool;

    /// A safe, human-readable serialization for diagnostics.
    fn describe(&self) -> String {
        "<matcher>".to_string()
    }
}

/// A boolean expression tree over a telemetry event.
///
/// Leaves: event-name equality (case-insensitive), property key/value
/// equality, a probabilistic sampling draw, and the fail-closed
/// [`Matcher::Invalid`] leaf. Composites: `And` (short-circuits on the
/// first false child), `Or` (short-circuits on the first true child) and
/// `Not` (exactly one child, inverted).
///
/// `Sampling` redraws independently on every evaluation - it is not
/// memoized per event, so embedding it under `And`/`Or` can yield
/// different outcomes on repeated evaluation of the same event unless the
/// caller caches the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Matcher {
    /// Event name equals the given name (case-insensitive).
    EventName {
        /// Name to compare against
        name: String,
    },
    /// User property `key` exists and equals `value`.
    PropertyValue {
        /// Property key
        key: String,
        /// Expected value
        value: PropertyValue,
    },
    /// All children match. Empty `And` matches everything.
    And {
        /// Child matchers, evaluated left to right
        children: Vec<Matcher>,
    },
    /// Any child matches. Empty `Or` matches nothing.
    Or {
        /// Child matchers, evaluated left to right
        children: Vec<Matcher>,
    },
    /// Inverts exactly one child.
    Not {
        /// The inverted child
        child: Box<Matcher>,
    },
    /// Uniform draw in [0,100); matches when the draw is below `percent`.
    Sampling {
        /// Inclusion percent, 0-100. Zero never matches.
        percent: u8,
    },
    /// Unrecognized or malformed declarative input. Always false.
    Invalid,
}

impl Matcher {
    /// Convenience constructor for an event-name leaf.
    pub fn event_name(name: impl Into<String>) -> Self {
        Matcher::EventName { name: name.into() }
    }

    /// Convenience constructor for a property-value leaf.
    pub fn property_value(key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        Matcher::PropertyValue {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Evaluate the tree against an event.
    ///
    /// Pure except for the `Sampling` leaf, which draws fresh randomness
    /// on every evaluation.
    pub fn evaluate(&self, event: &TelemetryEvent) -> bool {
        match self {
            Matcher::EventName { name } => event.name().eq_ignore_ascii_case(name),
            Matcher::PropertyValue { key, value } => event.property(key) == Some(value),
            Matcher::And { children } => children.iter().all(|c| c.evaluate(event)),
            Matcher::Or { children } => children.iter().any(|c| c.evaluate(event)),
            Matcher::Not { child } => !child.evaluate(event),
            Matcher::Sampling { percent } => {
                let percent = (*percent).min(100);
                rand::thread_rng().gen_range(0u8..100) < percent
            }
            Matcher::Invalid => false,
        }
    }
}

impl EventMatcher for Matcher {
    #[inline]
    fn matches(&self, event: &TelemetryEvent) -> bool {
        self.evaluate(event)
    }

    fn describe(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

#[cfg(test)]
#[path = "matcher_test.rs"]
mod matcher_test;
