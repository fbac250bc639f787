//! The persisted delivery channel.
//!
//! Durable, at-least-once-effort delivery to the collection endpoint,
//! tolerant of a process crash between "accepted" and "sent".
//!
//! On `start` the transport is resolved exactly once: a plugged-in
//! native transport is probed first; when absent or unavailable the
//! channel falls back to the direct HTTPS path backed by the on-disk
//! pending store. On the fallback path a background sender drains the
//! staging buffer to the store, seals batches and uploads them; network
//! failures are retried silently on a later cycle and never surface to
//! `post_event`.
//!
//! The staging buffer is capacity-bounded. When full, excess events are
//! dropped and counted rather than backpressuring the caller.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use crossbeam::queue::ArrayQueue;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use beacon_channel::{
    ChannelError, ChannelProperties, EventProcessor, Lifecycle, ProcessorError, TelemetryChannel,
};
use beacon_events::TelemetryEvent;

use crate::endpoint;
use crate::error::DeliveryError;
use crate::metrics::{DeliveryMetrics, DeliverySnapshot};
use crate::store::PendingStore;
use crate::transport::{NativeTransport, ResolvedTransport};

/// Channel id of the delivery channel.
pub const DELIVERY_CHANNEL_ID: &str = "delivery";

/// Default staging buffer capacity.
pub const DEFAULT_STAGING_CAPACITY: usize = 2048;

/// Default background send cadence.
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_secs(30);

/// HTTP request timeout for batch upload.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration of a [`DeliveryChannel`].
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Instrumentation key; selects the storage folder
    pub instrumentation_key: String,

    /// Root under which per-key storage folders live
    pub storage_root: PathBuf,

    /// Staging buffer capacity; excess events are dropped
    pub staging_capacity: usize,

    /// Background send cadence
    pub send_interval: Duration,

    /// Collection endpoint URL for the HTTPS fallback path
    pub endpoint_url: String,
}

impl DeliveryConfig {
    /// Configuration with the fixed collection endpoint and default
    /// staging/cadence settings.
    pub fn new(instrumentation_key: impl Into<String>, storage_root: impl Into<PathBuf>) -> Self {
        Self {
            instrumentation_key: instrumentation_key.into(),
            storage_root: storage_root.into(),
            staging_capacity: DEFAULT_STAGING_CAPACITY,
            send_interval: DEFAULT_SEND_INTERVAL,
            endpoint_url: endpoint::https_url(),
        }
    }
}

/// Persisted delivery channel with transport fallback.
pub struct DeliveryChannel {
    config: DeliveryConfig,
    /// Optional preferred native transport, probed during `start`
    native: Option<Arc<dyn NativeTransport>>,
    /// Resolved exactly once during `start`
    transport: OnceLock<ResolvedTransport>,
    /// Bounded staging between posting and persistence
    staging: ArrayQueue<Arc<TelemetryEvent>>,
    /// Pending store; present only on the HTTPS fallback path
    store: Mutex<Option<PendingStore>>,
    http: reqwest::Client,
    metrics: DeliveryMetrics,
    lifecycle: Lifecycle,
    cancel: CancellationToken,
    sender: Mutex<Option<JoinHandle<()>>>,
    /// Back-reference for spawning the sender from `start(&self)`
    self_ref: Weak<Self>,
}

impl DeliveryChannel {
    /// Create a channel with no native transport; `start` will resolve
    /// the direct HTTPS fallback.
    pub fn new(config: DeliveryConfig) -> Arc<Self> {
        Self::build(config, None)
    }

    /// Create a channel that probes `native` during `start` before
    /// falling back to HTTPS.
    pub fn with_native(config: DeliveryConfig, native: Arc<dyn NativeTransport>) -> Arc<Self> {
        Self::build(config, Some(native))
    }

    fn build(config: DeliveryConfig, native: Option<Arc<dyn NativeTransport>>) -> Arc<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_default();
        Arc::new_cyclic(|weak| Self {
            staging: ArrayQueue::new(config.staging_capacity.max(1)),
            config,
            native,
            transport: OnceLock::new(),
            store: Mutex::new(None),
            http,
            metrics: DeliveryMetrics::new(),
            lifecycle: Lifecycle::new(),
            cancel: CancellationToken::new(),
            sender: Mutex::new(None),
            self_ref: weak.clone(),
        })
    }

    /// Point-in-time metrics.
    pub fn metrics(&self) -> DeliverySnapshot {
        self.metrics.snapshot()
    }

    /// Move stray pending files (found by legacy discovery) into this
    /// channel's storage folder so the sender uploads them. Returns how
    /// many were adopted. A no-op on the native path.
    pub fn adopt_stray_batches(&self, strays: &[PathBuf]) -> usize {
        let store = self.store.lock();
        let Some(store) = store.as_ref() else {
            return 0;
        };
        let mut adopted = 0;
        for stray in strays {
            let Some(name) = stray.file_name() else {
                continue;
            };
            let target = store.folder().join(name);
            match std::fs::rename(stray, &target) {
                Ok(()) => {
                    adopted += 1;
                    debug!(from = %stray.display(), "stray batch adopted");
                }
                Err(error) => {
                    warn!(from = %stray.display(), %error, "failed to adopt stray batch");
                }
            }
        }
        adopted
    }

    /// One sender cycle: drain staging to the store, seal, upload.
    async fn flush_cycle(&self) {
        self.persist_staged();
        self.seal_open_batch();
        self.upload_sealed().await;
    }

    /// Drain the staging buffer into the pending store.
    fn persist_staged(&self) {
        let store = self.store.lock();
        let Some(store) = store.as_ref() else {
            return;
        };
        while let Some(event) = self.staging.pop() {
            match store.append(&event) {
                Ok(()) => {
                    self.metrics.events_persisted.fetch_add(1, Ordering::Relaxed);
                }
                Err(error) => {
                    self.metrics.persist_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(event = event.name(), %error, "failed to persist staged event");
                }
            }
        }
    }

    fn seal_open_batch(&self) {
        let store = self.store.lock();
        let Some(store) = store.as_ref() else {
            return;
        };
        match store.seal() {
            Ok(Some(path)) => {
                self.metrics.batches_sealed.fetch_add(1, Ordering::Relaxed);
                trace!(path = %path.display(), "batch ready for upload");
            }
            Ok(None) => {}
            Err(error) => warn!(%error, "failed to seal batch"),
        }
    }

    /// Upload sealed batches, oldest first. Stops at the first network
    /// failure; the remaining batches wait for the next cycle.
    async fn upload_sealed(&self) {
        let batches = {
            let store = self.store.lock();
            let Some(store) = store.as_ref() else {
                return;
            };
            match store.sealed_batches() {
                Ok(batches) => batches,
                Err(error) => {
                    warn!(%error, "failed to list sealed batches");
                    return;
                }
            }
        };

        for batch in batches {
            let bytes = match tokio::fs::read(&batch).await {
                Ok(bytes) => bytes,
                // Vanished due to concurrent cleanup; nothing to send.
                Err(error) if error.kind() == ErrorKind::NotFound => continue,
                Err(error) => {
                    warn!(path = %batch.display(), %error, "failed to read sealed batch");
                    continue;
                }
            };

            match self.post_batch(bytes).await {
                Ok(()) => {
                    self.metrics.batches_uploaded.fetch_add(1, Ordering::Relaxed);
                    let store = self.store.lock();
                    if let Some(store) = store.as_ref() {
                        if let Err(error) = store.remove(&batch) {
                            warn!(path = %batch.display(), %error, "failed to remove uploaded batch");
                        }
                    }
                    debug!(path = %batch.display(), "batch uploaded");
                }
                Err(error) => {
                    self.metrics.upload_failures.fetch_add(1, Ordering::Relaxed);
                    debug!(%error, "batch upload failed, will retry next cycle");
                    break;
                }
            }
        }
    }

    async fn post_batch(&self, bytes: Vec<u8>) -> crate::error::Result<()> {
        let response = self
            .http
            .post(&self.config.endpoint_url)
            .header("Content-Type", "application/x-ndjson")
            .body(bytes)
            .send()
            .await
            .map_err(|error| DeliveryError::Network(error.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Server(response.status().as_u16()))
        }
    }
}

#[async_trait]
impl TelemetryChannel for DeliveryChannel {
    fn channel_id(&self) -> &str {
        DELIVERY_CHANNEL_ID
    }

    fn properties(&self) -> ChannelProperties {
        ChannelProperties::DEFAULT
    }

    fn is_started(&self) -> bool {
        self.lifecycle.is_started()
    }

    fn transport_used(&self) -> Option<String> {
        self.transport.get().map(ResolvedTransport::describe)
    }

    fn try_get_transport(&self) -> Option<String> {
        self.transport.get().and_then(ResolvedTransport::sub_transport)
    }

    fn start(&self, session_id: &str) -> beacon_channel::Result<()> {
        self.lifecycle.begin_start()?;

        let resolved = match &self.native {
            Some(native) if native.is_available() => {
                ResolvedTransport::Native(Arc::clone(native))
            }
            _ => ResolvedTransport::DirectHttps,
        };

        if matches!(resolved, ResolvedTransport::DirectHttps) {
            let store = PendingStore::open(
                &self.config.storage_root,
                &self.config.instrumentation_key,
            )
            .map_err(|error| {
                // A channel whose storage never came up must not accept
                // events; push the lifecycle past Started.
                self.lifecycle.mark_disposed();
                ChannelError::Startup(error.to_string())
            })?;
            *self.store.lock() = Some(store);

            // The weak back-reference only fails while the channel is
            // being dropped, at which point there is nothing to send.
            if let Some(me) = self.self_ref.upgrade() {
                let token = self.cancel.clone();
                let cadence = self.config.send_interval;
                let handle = tokio::spawn(async move {
                    let mut interval = tokio::time::interval(cadence);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    // Swallow the immediate first tick; the first real
                    // cycle runs one cadence after start.
                    interval.tick().await;
                    loop {
                        tokio::select! {
                            _ = token.cancelled() => break,
                            _ = interval.tick() => {
                                me.flush_cycle().await;
                            }
                        }
                    }
                });
                *self.sender.lock() = Some(handle);
            }
        }

        let transport = resolved.describe();
        let _ = self.transport.set(resolved);
        debug!(session_id, transport, "delivery channel started");
        Ok(())
    }

    fn post_event(&self, event: Arc<TelemetryEvent>) -> beacon_channel::Result<()> {
        self.lifecycle.require_started()?;
        self.metrics.events_accepted.fetch_add(1, Ordering::Relaxed);

        match self.transport.get() {
            Some(ResolvedTransport::Native(native)) => native.send(&event),
            _ => {
                if self.staging.push(event).is_err() {
                    self.metrics.events_dropped.fetch_add(1, Ordering::Relaxed);
                    trace!("staging full, event dropped");
                }
            }
        }
        Ok(())
    }

    fn post_routed_event(
        &self,
        event: Arc<TelemetryEvent>,
        _route_args: &beacon_channel::RouteArgs,
    ) -> beacon_channel::Result<()> {
        // Routing rules deliver here like a direct post; the args carry
        // rule metadata the delivery path does not interpret.
        self.post_event(event)
    }

    async fn dispose_and_transmit(&self, token: CancellationToken) -> beacon_channel::Result<()> {
        if !self.lifecycle.mark_disposed() {
            return Ok(());
        }

        self.cancel.cancel();
        if let Some(handle) = self.sender.lock().take() {
            handle.abort();
        }

        // Final drain. Storage errors here are already swallowed by the
        // drain helpers; shutdown transmission is best-effort.
        self.persist_staged();
        self.seal_open_batch();
        tokio::select! {
            _ = token.cancelled() => {
                debug!("shutdown transmit cancelled");
            }
            _ = self.upload_sealed() => {}
        }

        // Release the storage lock even when the transmit was cancelled.
        *self.store.lock() = None;
        debug!(metrics = ?self.metrics.snapshot(), "delivery channel disposed");
        Ok(())
    }
}

/// Adapter that lets a [`beacon_channel::ScheduledDispatcher`] wrap the
/// delivery channel as its inner processor, batching the posting hot
/// path in front of the staging/persistence machinery.
pub struct DeliveryProcessor {
    channel: Arc<DeliveryChannel>,
}

impl DeliveryProcessor {
    pub fn new(channel: Arc<DeliveryChannel>) -> Self {
        Self { channel }
    }

    /// The wrapped delivery channel.
    pub fn channel(&self) -> &Arc<DeliveryChannel> {
        &self.channel
    }
}

#[async_trait]
impl EventProcessor for DeliveryProcessor {
    fn process(&self, event: Arc<TelemetryEvent>) -> std::result::Result<(), ProcessorError> {
        self.channel
            .post_event(event)
            .map_err(|error| Box::new(error) as ProcessorError)
    }

    fn transport_used(&self) -> Option<String> {
        self.channel.transport_used()
    }

    async fn dispose_and_transmit(&self, token: CancellationToken) -> beacon_channel::Result<()> {
        self.channel.dispose_and_transmit(token).await
    }
}

impl std::fmt::Debug for DeliveryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryChannel")
            .field("key", &self.config.instrumentation_key)
            .field("transport", &self.transport.get())
            .field("started", &self.lifecycle.is_started())
            .finish()
    }
}

#[cfg(test)]
#[path = "channel_test.rs"]
mod channel_test;
