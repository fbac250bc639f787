//! Subscription records held by the notification service.

use std::fmt;
use std::sync::Arc;

use beacon_events::TelemetryEvent;
use beacon_matcher::EventMatcher;

/// Handler invoked with a copy of each matched event.
pub type EventHandler = Box<dyn Fn(TelemetryEvent) + Send + Sync>;

/// A registered matcher/handler pair.
///
/// Single-shot subscriptions are removed before their handler runs, so a
/// handler that posts a matching event from inside itself cannot fire
/// twice.
pub struct Subscription {
    id: u64,
    matcher: Arc<dyn EventMatcher>,
    handler: EventHandler,
    single_shot: bool,
}

impl Subscription {
    pub(crate) fn new(
        id: u64,
        matcher: Arc<dyn EventMatcher>,
        handler: EventHandler,
        single_shot: bool,
    ) -> Self {
        Self { id, matcher, handler, single_shot }
    }

    /// Service-local identifier, unique for the lifetime of the service.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn is_single_shot(&self) -> bool {
        self.single_shot
    }

    #[inline]
    pub(crate) fn matcher(&self) -> &Arc<dyn EventMatcher> {
        &self.matcher
    }

    #[inline]
    pub(crate) fn invoke(&self, event: TelemetryEvent) {
        (self.handler)(event)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("single_shot", &self.single_shot)
            .finish_non_exhaustive()
    }
}
