//! Scheduled batch dispatcher - buffering/draining engine around an
//! inner processor.
//!
//! Decouples high-frequency synchronous posting from the cost of
//! downstream processing: `post_event` pushes onto a lock-free FIFO and
//! returns; a timer task drains the queue on a fixed cadence (default one
//! second) through a re-entrancy-guarded drain body.
//!
//! # Concurrency invariant
//!
//! At most one drain pass executes at a time. A timer tick that fires
//! while a prior drain is still running is a no-op.
//!
//! # Poison isolation
//!
//! A processor error for one dequeued event is converted into a
//! self-describing fault event (tagged with the current process id for
//! dump correlation) and re-posted into the owning session. The drain
//! loop never dies from a single bad event.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use crossbeam::queue::SegQueue;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use beacon_events::{fault_names, reserved, FaultEvent, TelemetryEvent};

use crate::channel::TelemetryChannel;
use crate::error::Result;
use crate::lifecycle::Lifecycle;
use crate::poster::EventPoster;
use crate::properties::ChannelProperties;

/// Default drain cadence.
pub const DEFAULT_CADENCE: Duration = Duration::from_secs(1);

/// Error type produced by an inner processor for a single event.
pub type ProcessorError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The inner processor wrapped by a [`ScheduledDispatcher`].
#[async_trait]
pub trait EventProcessor: Send + Sync + 'static {
    /// Process one dequeued event. Errors are isolated per event.
    fn process(&self, event: Arc<TelemetryEvent>) -> std::result::Result<(), ProcessorError>;

    /// The processor's resolved transport, if it has one.
    fn transport_used(&self) -> Option<String> {
        None
    }

    /// Flush and release the processor's own resources. Called exactly
    /// once by the dispatcher's dispose.
    async fn dispose_and_transmit(&self, token: CancellationToken) -> Result<()>;
}

/// One-time callback fired after the first drain pass that empties the
/// queue.
type InitializedCallback = Box<dyn FnOnce() + Send>;

/// Generic buffering/draining channel around an [`EventProcessor`].
pub struct ScheduledDispatcher<P: EventProcessor> {
    /// Channel id exposed to the session
    id: String,
    /// Property flags exposed to the session
    properties: ChannelProperties,
    /// The wrapped processor
    inner: Arc<P>,
    /// Fault-event sink of the owning session
    poster: Arc<dyn EventPoster>,
    /// Concurrent FIFO between posting and draining
    queue: SegQueue<Arc<TelemetryEvent>>,
    /// Drain cadence
    cadence: Duration,
    /// Enter/exit guard around the drain body
    draining: AtomicBool,
    /// Whether the one-time initialized callback already fired
    initialized_fired: AtomicBool,
    /// The one-time initialized callback
    on_initialized: Mutex<Option<InitializedCallback>>,
    /// Thread currently inside the drain body, for re-entrancy detection
    drain_thread: Mutex<Option<std::thread::ThreadId>>,
    /// Lifecycle state
    lifecycle: Lifecycle,
    /// Cancels the timer task
    cancel: CancellationToken,
    /// Timer task handle
    timer: Mutex<Option<JoinHandle<()>>>,
    /// Back-reference for spawning the timer from `start(&self)`
    self_ref: Weak<Self>,
}

impl<P: EventProcessor> ScheduledDispatcher<P> {
    /// Create a dispatcher with the default one-second cadence.
    ///
    /// Accepts the processor by value or already shared behind an `Arc`.
    pub fn new(
        id: impl Into<String>,
        inner: impl Into<Arc<P>>,
        poster: Arc<dyn EventPoster>,
    ) -> Arc<Self> {
        Self::with_cadence(id, inner, poster, DEFAULT_CADENCE)
    }

    /// Create a dispatcher with an explicit drain cadence.
    pub fn with_cadence(
        id: impl Into<String>,
        inner: impl Into<Arc<P>>,
        poster: Arc<dyn EventPoster>,
        cadence: Duration,
    ) -> Arc<Self> {
        let inner = inner.into();
        Arc::new_cyclic(|weak| Self {
            id: id.into(),
            properties: ChannelProperties::DEFAULT,
            inner,
            poster,
            queue: SegQueue::new(),
            cadence,
            draining: AtomicBool::new(false),
            initialized_fired: AtomicBool::new(false),
            on_initialized: Mutex::new(None),
            drain_thread: Mutex::new(None),
            lifecycle: Lifecycle::new(),
            cancel: CancellationToken::new(),
            timer: Mutex::new(None),
            self_ref: weak.clone(),
        })
    }

    /// Register the one-time callback fired after the first drain pass
    /// that empties the queue. Later empties do not re-fire it.
    pub fn on_initialized(&self, callback: impl FnOnce() + Send + 'static) {
        *self.on_initialized.lock() = Some(Box::new(callback));
    }

    /// The wrapped processor.
    pub fn inner(&self) -> &Arc<P> {
        &self.inner
    }

    /// Number of events currently buffered.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Attempt one drain pass.
    ///
    /// Returns `None` when another drain is already in flight (the tick is
    /// a no-op), otherwise the number of events processed.
    pub fn try_drain(&self) -> Option<usize> {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            trace!(channel = %self.id, "drain already in flight, tick skipped");
            return None;
        }

        *self.drain_thread.lock() = Some(std::thread::current().id());

        let mut processed = 0;
        while let Some(event) = self.queue.pop() {
            if let Err(error) = self.inner.process(Arc::clone(&event)) {
                self.report_poison(&event, error);
            }
            processed += 1;
        }

        // The queue is empty here; only the first pass to get this far
        // may fire the initialized callback.
        let first_empty = !self.initialized_fired.swap(true, Ordering::AcqRel);

        *self.drain_thread.lock() = None;
        self.draining.store(false, Ordering::Release);

        // The callback is user code of unbounded duration; it runs after
        // the guard is released so it cannot extend the single-flight
        // critical section.
        if first_empty {
            let callback = self.on_initialized.lock().take();
            if let Some(callback) = callback {
                callback();
            }
        }

        if processed > 0 {
            trace!(channel = %self.id, processed, "drain pass complete");
        }
        Some(processed)
    }

    /// Convert one poison event into a fault event and re-post it.
    fn report_poison(&self, event: &TelemetryEvent, error: ProcessorError) {
        warn!(
            channel = %self.id,
            event = event.name(),
            error = %error,
            "event poisoned drain pass, isolating"
        );

        let fault = FaultEvent::for_current_process(fault_names::POISON_EVENT)
            .with_exception(error.to_string())
            .with_reserved(reserved::FAULT_SOURCE_EVENT, event.name());
        self.poster.post_fault(fault);
    }
}

#[async_trait]
impl<P: EventProcessor> TelemetryChannel for ScheduledDispatcher<P> {
    fn channel_id(&self) -> &str {
        &self.id
    }

    fn properties(&self) -> ChannelProperties {
        self.properties
    }

    fn is_started(&self) -> bool {
        self.lifecycle.is_started()
    }

    fn transport_used(&self) -> Option<String> {
        self.inner.transport_used()
    }

    fn start(&self, session_id: &str) -> Result<()> {
        self.lifecycle.begin_start()?;

        // The weak back-reference only fails once the dispatcher is being
        // dropped, at which point there is nothing left to drain.
        if let Some(me) = self.self_ref.upgrade() {
            let token = self.cancel.clone();
            let cadence = self.cadence;
            let handle = tokio::spawn(async move {
                let mut interval = tokio::time::interval(cadence);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = interval.tick() => {
                            me.try_drain();
                        }
                    }
                }
            });
            *self.timer.lock() = Some(handle);
        }

        debug!(channel = %self.id, session_id, cadence_ms = self.cadence.as_millis() as u64, "dispatcher started");
        Ok(())
    }

    fn post_event(&self, event: Arc<TelemetryEvent>) -> Result<()> {
        self.lifecycle.require_started()?;
        self.queue.push(event);
        Ok(())
    }

    async fn dispose_and_transmit(&self, token: CancellationToken) -> Result<()> {
        if !self.lifecycle.mark_disposed() {
            return Ok(());
        }

        // Stop the timer cooperatively; abort as a backstop instead of
        // joining so a dispose issued from inside a processing callback
        // cannot deadlock waiting on the task it runs on.
        self.cancel.cancel();
        if let Some(handle) = self.timer.lock().take() {
            handle.abort();
        }

        // Final full drain. An in-flight pass may have taken its last pop
        // before a late post landed, so the queue must be observed empty
        // by a completed drain before delegating to the inner processor.
        // A dispose issued from inside a processing callback is detected
        // by thread id and skips the wait: its own enclosing drain runs
        // the queue to empty once input has stopped.
        loop {
            if let Some(remaining) = self.try_drain() {
                if self.queue.is_empty() {
                    debug!(channel = %self.id, remaining, "final drain complete");
                    break;
                }
                continue;
            }
            if *self.drain_thread.lock() == Some(std::thread::current().id()) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        self.inner.dispose_and_transmit(token).await
    }
}

impl<P: EventProcessor> std::fmt::Debug for ScheduledDispatcher<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledDispatcher")
            .field("id", &self.id)
            .field("queued", &self.queue.len())
            .field("started", &self.lifecycle.is_started())
            .finish()
    }
}

#[cfg(test)]
#[path = "dispatcher_test.rs"]
mod dispatcher_test;
