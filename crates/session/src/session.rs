//! Session fan-out - the front door of the pipeline.
//!
//! A [`TelemetrySession`] owns the channel set, the live-stream tap point
//! and the telemetry opt-in flag. `post_event` stamps the post timestamp,
//! shares the event behind an `Arc`, fans it out to every started channel
//! whose properties the session context admits, then taps the live
//! stream. Posting never blocks and never surfaces channel errors; only
//! lifecycle contract violations (double start) surface, synchronously.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use beacon_channel::{
    ChannelProperties, EventPoster, Lifecycle, TapPoint, TelemetryChannel, WatsonReporter,
};
use beacon_events::{FaultEvent, TelemetryEvent};
use beacon_notify::NotificationService;

use crate::error::Result;

/// Configuration of a [`TelemetrySession`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Stable session identifier passed to every channel's `start`
    pub session_id: String,

    /// Initial telemetry opt-in state
    pub opted_in: bool,

    /// Channel property flags admitted by this session context. A
    /// channel is fanned out to only when its properties intersect
    /// these.
    pub active: ChannelProperties,
}

impl SessionConfig {
    /// Default context: opted in, default channels only.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            opted_in: true,
            active: ChannelProperties::DEFAULT,
        }
    }
}

struct SessionInner {
    session_id: String,
    active: ChannelProperties,
    channels: RwLock<Vec<Arc<dyn TelemetryChannel>>>,
    /// Typed handle to the crash report gate, if attached
    watson: RwLock<Option<Arc<WatsonReporter>>>,
    tap: Arc<TapPoint>,
    /// Opt-in flag shared with the Watson gate
    opted_in: Arc<AtomicBool>,
    lifecycle: Lifecycle,
    events_posted: AtomicU64,
}

/// The owning session: channel set, tap point, opt-in state.
///
/// Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct TelemetrySession {
    inner: Arc<SessionInner>,
}

impl TelemetrySession {
    /// Create a session with no channels attached.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                session_id: config.session_id,
                active: config.active,
                channels: RwLock::new(Vec::new()),
                watson: RwLock::new(None),
                tap: Arc::new(TapPoint::new()),
                opted_in: Arc::new(AtomicBool::new(config.opted_in)),
                lifecycle: Lifecycle::new(),
                events_posted: AtomicU64::new(0),
            }),
        }
    }

    /// Session identifier.
    #[inline]
    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    /// The live-stream tap point.
    #[inline]
    pub fn tap(&self) -> &Arc<TapPoint> {
        &self.inner.tap
    }

    /// Whether the session is opted into telemetry collection.
    #[inline]
    pub fn is_opted_in(&self) -> bool {
        self.inner.opted_in.load(Ordering::Acquire)
    }

    /// Flip the opt-in state. Takes effect immediately, including for
    /// the Watson gate sharing this flag.
    pub fn set_opted_in(&self, opted_in: bool) {
        self.inner.opted_in.store(opted_in, Ordering::Release);
        debug!(opted_in, "telemetry opt-in changed");
    }

    /// The shared opt-in flag, for constructing a Watson gate.
    pub fn opted_in_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.inner.opted_in)
    }

    /// Attach a channel. On an already started session the channel is
    /// started immediately; its start failure is logged, not surfaced.
    pub fn add_channel(&self, channel: Arc<dyn TelemetryChannel>) {
        if self.inner.lifecycle.is_started() {
            if let Err(error) = channel.start(&self.inner.session_id) {
                warn!(channel = channel.channel_id(), %error, "late channel failed to start");
            }
        }
        let mut channels = self.inner.channels.write();
        debug!(channel = channel.channel_id(), count = channels.len() + 1, "channel attached");
        channels.push(channel);
    }

    /// Attach the crash report gate. It joins the channel set and fault
    /// posting routes through it.
    pub fn attach_watson(&self, watson: Arc<WatsonReporter>) {
        *self.inner.watson.write() = Some(Arc::clone(&watson));
        self.add_channel(watson);
    }

    /// Bind a notification service to this session's live stream.
    pub fn bind_notifications(&self, service: &NotificationService) -> beacon_notify::Result<()> {
        service.bind(Arc::clone(&self.inner.tap), Arc::new(self.clone()))
    }

    /// Start the session and every attached channel. At most once; a
    /// channel whose start fails is logged and stays un-started.
    pub fn start(&self) -> Result<()> {
        self.inner.lifecycle.begin_start()?;

        let channels = self.inner.channels.read();
        for channel in channels.iter() {
            if let Err(error) = channel.start(&self.inner.session_id) {
                warn!(channel = channel.channel_id(), %error, "channel failed to start");
            }
        }
        debug!(
            session_id = %self.inner.session_id,
            channels = channels.len(),
            "session started"
        );
        Ok(())
    }

    /// Post an event: stamp it, fan it out, tap the live stream.
    ///
    /// Never blocks and never surfaces channel errors. Posting on a
    /// session that is not started quietly drops the event.
    pub fn post_event(&self, mut event: TelemetryEvent) {
        if !self.inner.lifecycle.is_started() {
            trace!(event = event.name(), "session not started, event dropped");
            return;
        }

        event.stamp_posted();
        let event = Arc::new(event);
        self.inner.events_posted.fetch_add(1, Ordering::Relaxed);

        let channels = self.inner.channels.read();
        for channel in channels.iter() {
            if !channel.is_started() || !channel.properties().intersects(self.inner.active) {
                continue;
            }
            if let Err(error) = channel.post_event(Arc::clone(&event)) {
                debug!(channel = channel.channel_id(), %error, "channel refused event");
            }
        }
        drop(channels);

        self.inner.tap.tap(&event);
    }

    /// Post a fault event. The Watson gate, when attached, stamps its
    /// inclusion decision first; the fault then folds into a plain event
    /// and takes the normal posting path.
    pub fn post_fault(&self, mut fault: FaultEvent) {
        let watson = self.inner.watson.read().clone();
        if let Some(watson) = watson {
            if let Err(error) = watson.evaluate_fault(&mut fault) {
                debug!(%error, "watson evaluation skipped");
            }
        }
        self.post_event(fault.into_event());
    }

    /// Total events accepted by `post_event`.
    pub fn events_posted(&self) -> u64 {
        self.inner.events_posted.load(Ordering::Relaxed)
    }

    /// Dispose every channel, flushing best-effort under the token.
    /// Idempotent; per-channel failures are logged and do not stop the
    /// remaining channels from being disposed.
    pub async fn dispose_and_transmit(&self, token: CancellationToken) -> Result<()> {
        if !self.inner.lifecycle.mark_disposed() {
            return Ok(());
        }

        let channels: Vec<Arc<dyn TelemetryChannel>> = self.inner.channels.read().clone();
        for channel in channels {
            if let Err(error) = channel.dispose_and_transmit(token.clone()).await {
                warn!(channel = channel.channel_id(), %error, "channel dispose failed");
            }
        }
        debug!(
            session_id = %self.inner.session_id,
            events_posted = self.events_posted(),
            "session disposed"
        );
        Ok(())
    }
}

impl EventPoster for TelemetrySession {
    fn post(&self, event: TelemetryEvent) {
        self.post_event(event);
    }

    fn post_fault(&self, fault: FaultEvent) {
        self.post_fault(fault);
    }
}

impl std::fmt::Debug for TelemetrySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetrySession")
            .field("session_id", &self.inner.session_id)
            .field("channels", &self.inner.channels.read().len())
            .field("started", &self.inner.lifecycle.is_started())
            .finish()
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
