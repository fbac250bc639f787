//! Pub/sub notification service over the live event stream.
//!
//! Subscribers register an [`EventMatcher`] and a handler. Events posted
//! through the session are tapped into a lock-free queue and dispatched
//! asynchronously, in posting order, by a single loop task.
//!
//! # Lifecycle
//!
//! The tap attachment and the dispatch loop are demand-driven: the first
//! subscription attaches the tap and spawns the loop, the removal of the
//! last one detaches and cancels. A loop spawned while its cancelled
//! predecessor is still exiting waits for that exit before it drains, so
//! at most one loop ever pops the queue. A service with no subscriptions
//! costs the posting hot path nothing.
//!
//! # Fault isolation
//!
//! A matcher that panics is removed and a `matcherfault` diagnostic event
//! is posted back through the session. A handler that panics is kept (its
//! matcher is known good) and a `subscriberfault` event is posted. Other
//! subscriptions are never affected.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::queue::SegQueue;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use beacon_channel::{EventPoster, TapPoint};
use beacon_events::{fault_names, reserved, FaultEvent, TelemetryEvent};
use beacon_matcher::EventMatcher;

use crate::error::{NotifyError, Result};
use crate::signal::ManualResetSignal;
use crate::subscription::{EventHandler, Subscription};

/// Session surfaces the service dispatches through.
struct Binding {
    tap: Arc<TapPoint>,
    poster: Arc<dyn EventPoster>,
}

/// Live tap attachment and dispatch loop, present only while at least
/// one subscription exists.
struct Engine {
    tap_registration: u64,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct ServiceInner {
    subscriptions: RwLock<Vec<Arc<Subscription>>>,
    /// Id source for subscriptions; ids are unique per service instance.
    next_id: AtomicU64,
    queue: SegQueue<Arc<TelemetryEvent>>,
    signal: ManualResetSignal,
    binding: Mutex<Option<Binding>>,
    engine: Mutex<Option<Engine>>,
    /// Task handle of a cancelled loop that may not have exited yet. The
    /// next engine awaits it before dispatching, so two loops never pop
    /// the queue concurrently. Holds at most one handle: [`ensure_engine`]
    /// always takes it when spawning a successor.
    ///
    /// [`ensure_engine`]: NotificationService::ensure_engine
    retiring: Mutex<Option<JoinHandle<()>>>,
}

/// The subscription registry and its dispatch loop.
///
/// Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct NotificationService {
    inner: Arc<ServiceInner>,
}

impl Default for NotificationService {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationService {
    /// Create an unbound service. It must be bound to a session tap
    /// before subscriptions are accepted.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                subscriptions: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
                queue: SegQueue::new(),
                signal: ManualResetSignal::new(),
                binding: Mutex::new(None),
                engine: Mutex::new(None),
                retiring: Mutex::new(None),
            }),
        }
    }

    /// Bind the service to a session's tap point and posting surface.
    ///
    /// Rebinding is allowed only while no subscriptions are live; a bound
    /// service with live subscriptions would otherwise silently switch
    /// streams under its subscribers.
    pub fn bind(&self, tap: Arc<TapPoint>, poster: Arc<dyn EventPoster>) -> Result<()> {
        let mut binding = self.inner.binding.lock();
        if binding.is_some() {
            let live = self.inner.subscriptions.read().len();
            if live > 0 {
                return Err(NotifyError::SessionBound { live });
            }
        }
        *binding = Some(Binding { tap, poster });
        debug!("notification service bound");
        Ok(())
    }

    /// Register a handler for events accepted by `matcher`.
    ///
    /// Returns a subscription id for [`unsubscribe`](Self::unsubscribe).
    /// The first subscription attaches the tap and starts the dispatch
    /// loop.
    pub fn subscribe(
        &self,
        matcher: Arc<dyn EventMatcher>,
        handler: EventHandler,
    ) -> Result<u64> {
        self.register(matcher, handler, false)
    }

    /// Like [`subscribe`](Self::subscribe), but the subscription is
    /// removed after its first delivery. The removal happens before the
    /// handler runs, so a handler that posts a matching event from inside
    /// itself cannot fire twice.
    pub fn subscribe_once(
        &self,
        matcher: Arc<dyn EventMatcher>,
        handler: EventHandler,
    ) -> Result<u64> {
        self.register(matcher, handler, true)
    }

    fn register(
        &self,
        matcher: Arc<dyn EventMatcher>,
        handler: EventHandler,
        single_shot: bool,
    ) -> Result<u64> {
        if self.inner.binding.lock().is_none() {
            return Err(NotifyError::NotBound);
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let subscription = Arc::new(Subscription::new(id, matcher, handler, single_shot));

        {
            let mut subscriptions = self.inner.subscriptions.write();
            subscriptions.push(subscription);
            debug!(id, single_shot, count = subscriptions.len(), "subscribed");
        }
        self.ensure_engine();
        Ok(id)
    }

    /// Remove a subscription by id. Unknown ids are ignored; removing the
    /// last subscription detaches the tap and stops the dispatch loop.
    pub fn unsubscribe(&self, id: u64) {
        if self.inner.remove(id) {
            debug!(id, "unsubscribed");
        }
        self.inner.stop_engine_if_idle();
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.read().len()
    }

    /// Attach the tap and spawn the dispatch loop if not already running.
    fn ensure_engine(&self) {
        let mut engine = self.inner.engine.lock();
        if engine.is_some() {
            return;
        }
        let binding = self.inner.binding.lock();
        let Some(binding) = binding.as_ref() else {
            return;
        };

        let weak = Arc::downgrade(&self.inner);
        let tap_registration = binding.tap.attach(Arc::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.queue.push(Arc::clone(event));
                inner.signal.set();
            }
        }));

        let cancel = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let prior = self.inner.retiring.lock().take();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            // A cancelled predecessor may still be draining the queue;
            // wait for it to exit before this loop starts popping.
            if let Some(prior) = prior {
                let _ = prior.await;
            }
            ServiceInner::run(inner, token).await;
        });
        *engine = Some(Engine { tap_registration, cancel, task });
        debug!(tap_registration, "dispatch loop started");
    }
}

impl ServiceInner {
    /// Remove a subscription by id. Returns whether it was present.
    fn remove(&self, id: u64) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|sub| sub.id() != id);
        subscriptions.len() != before
    }

    /// Detach the tap and cancel the loop when no subscriptions remain.
    fn stop_engine_if_idle(&self) {
        let mut engine = self.engine.lock();
        if self.subscriptions.read().is_empty() {
            if let Some(engine) = engine.take() {
                if let Some(binding) = self.binding.lock().as_ref() {
                    binding.tap.detach(engine.tap_registration);
                }
                engine.cancel.cancel();
                // Never joined here: this can run on the loop's own
                // thread. The handle is parked for a possible successor.
                *self.retiring.lock() = Some(engine.task);
                debug!("dispatch loop stopped");
            }
        }
    }

    async fn run(inner: Arc<Self>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = inner.signal.wait() => {}
            }
            inner.signal.reset();
            while let Some(event) = inner.queue.pop() {
                inner.dispatch(&event);
            }
        }
        trace!("dispatch loop exited");
    }

    /// Deliver one event to every matching subscription.
    fn dispatch(&self, event: &Arc<TelemetryEvent>) {
        let subscriptions: Vec<Arc<Subscription>> = self.subscriptions.read().clone();
        for subscription in subscriptions {
            let matched = panic::catch_unwind(AssertUnwindSafe(|| {
                subscription.matcher().matches(event)
            }));
            let matched = match matched {
                Ok(matched) => matched,
                Err(payload) => {
                    self.remove(subscription.id());
                    self.stop_engine_if_idle();
                    self.report_matcher_fault(&subscription, event, &payload);
                    continue;
                }
            };
            if !matched {
                continue;
            }

            // Single-shot: claim the removal before invoking so a
            // re-entrant post cannot deliver twice. If another path
            // already removed it, it must not fire at all.
            if subscription.is_single_shot() {
                if !self.remove(subscription.id()) {
                    continue;
                }
                self.stop_engine_if_idle();
            }

            let invoked = panic::catch_unwind(AssertUnwindSafe(|| {
                subscription.invoke((**event).clone())
            }));
            if let Err(payload) = invoked {
                self.report_handler_fault(&subscription, event, &payload);
            }
        }
    }

    /// A matcher panicked: it has been removed; tell the stream why.
    fn report_matcher_fault(
        &self,
        subscription: &Subscription,
        event: &TelemetryEvent,
        payload: &(dyn std::any::Any + Send),
    ) {
        let message = panic_message(payload);
        warn!(
            id = subscription.id(),
            event = event.name(),
            message,
            "matcher faulted, subscription removed"
        );

        // Describing the matcher may itself panic; degrade to the
        // original panic message rather than lose the report.
        let description = panic::catch_unwind(AssertUnwindSafe(|| {
            subscription.matcher().describe()
        }))
        .unwrap_or_else(|_| message.clone());

        self.post_fault(
            FaultEvent::for_current_process(fault_names::MATCHER_FAULT)
                .with_exception(message)
                .with_reserved(reserved::FAULT_SOURCE_EVENT, event.name())
                .with_reserved(reserved::FAULT_MATCHER, description),
        );
    }

    /// A handler panicked: the subscription survives; tell the stream.
    fn report_handler_fault(
        &self,
        subscription: &Subscription,
        event: &TelemetryEvent,
        payload: &(dyn std::any::Any + Send),
    ) {
        let message = panic_message(payload);
        warn!(
            id = subscription.id(),
            event = event.name(),
            message,
            "subscriber handler faulted"
        );
        self.post_fault(
            FaultEvent::for_current_process(fault_names::HANDLER_FAULT)
                .with_exception(message)
                .with_reserved(reserved::FAULT_SOURCE_EVENT, event.name()),
        );
    }

    fn post_fault(&self, fault: FaultEvent) {
        let poster = self
            .binding
            .lock()
            .as_ref()
            .map(|binding| Arc::clone(&binding.poster));
        if let Some(poster) = poster {
            poster.post_fault(fault);
        }
    }
}

/// Best-effort text of a panic payload.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic of unknown type".to_owned()
    }
}

#[cfg(test)]
#[path = "service_test.rs"]
mod service_test;
