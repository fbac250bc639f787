use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tempfile::TempDir;

use beacon_channel::{EventPoster, ScheduledDispatcher};

use super::*;

struct NullPoster;

impl EventPoster for NullPoster {
    fn post(&self, _event: TelemetryEvent) {}
}

struct FakeNative {
    available: bool,
    sent: AtomicU64,
}

impl FakeNative {
    fn new(available: bool) -> Arc<Self> {
        Arc::new(Self { available, sent: AtomicU64::new(0) })
    }
}

impl NativeTransport for FakeNative {
    fn name(&self) -> &str {
        "fake"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn send(&self, _event: &TelemetryEvent) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }
}

fn config(root: &TempDir) -> DeliveryConfig {
    DeliveryConfig {
        // Long cadence so tests drive the cycle explicitly.
        send_interval: Duration::from_secs(3600),
        ..DeliveryConfig::new("aif-key", root.path())
    }
}

fn event(name: &str) -> Arc<TelemetryEvent> {
    Arc::new(TelemetryEvent::new(name))
}

#[tokio::test]
async fn post_before_start_is_refused() {
    let root = TempDir::new().unwrap();
    let channel = DeliveryChannel::new(config(&root));
    let result = channel.post_event(event("early"));
    assert!(matches!(result, Err(ChannelError::NotStarted)));
    assert!(channel.transport_used().is_none());
}

#[tokio::test]
async fn second_start_is_refused() {
    let root = TempDir::new().unwrap();
    let channel = DeliveryChannel::new(config(&root));
    channel.start("session").unwrap();
    let result = channel.start("session");
    assert!(matches!(result, Err(ChannelError::AlreadyStarted)));
}

#[tokio::test]
async fn falls_back_to_https_without_native_transport() {
    let root = TempDir::new().unwrap();
    let channel = DeliveryChannel::new(config(&root));
    channel.start("session").unwrap();

    assert_eq!(channel.transport_used().as_deref(), Some("https"));
    // The HTTPS fallback has no distinguishable sub-transport.
    assert_eq!(channel.try_get_transport(), None);
}

#[tokio::test]
async fn unavailable_native_transport_is_skipped() {
    let root = TempDir::new().unwrap();
    let channel = DeliveryChannel::with_native(config(&root), FakeNative::new(false));
    channel.start("session").unwrap();
    assert_eq!(channel.transport_used().as_deref(), Some("https"));
}

#[tokio::test]
async fn available_native_transport_receives_events_directly() {
    let root = TempDir::new().unwrap();
    let native = FakeNative::new(true);
    let channel = DeliveryChannel::with_native(config(&root), Arc::clone(&native) as Arc<dyn NativeTransport>);
    channel.start("session").unwrap();

    assert_eq!(channel.transport_used().as_deref(), Some("native/fake"));
    assert_eq!(channel.try_get_transport().as_deref(), Some("fake"));

    channel.post_event(event("a")).unwrap();
    channel.post_event(event("b")).unwrap();
    assert_eq!(native.sent.load(Ordering::Relaxed), 2);

    // The native path never touches local storage, so no lock exists.
    assert!(!root.path().join("aif-key").join("storage.lock").exists());
}

#[tokio::test]
async fn start_fails_when_storage_is_locked() {
    let root = TempDir::new().unwrap();
    let _holder = crate::store::PendingStore::open(root.path(), "aif-key").unwrap();

    let channel = DeliveryChannel::new(config(&root));
    let result = channel.start("session");
    assert!(matches!(result, Err(ChannelError::Startup(_))));
    // The failed channel must not accept events.
    assert!(channel.post_event(event("late")).is_err());
}

#[tokio::test]
async fn staged_events_are_persisted_and_sealed() {
    let root = TempDir::new().unwrap();
    let channel = DeliveryChannel::new(config(&root));
    channel.start("session").unwrap();

    channel.post_event(event("one")).unwrap();
    channel.post_event(event("two")).unwrap();

    channel.persist_staged();
    channel.seal_open_batch();

    let snapshot = channel.metrics();
    assert_eq!(snapshot.events_accepted, 2);
    assert_eq!(snapshot.events_persisted, 2);
    assert_eq!(snapshot.batches_sealed, 1);

    let store = channel.store.lock();
    let batches = store.as_ref().unwrap().sealed_batches().unwrap();
    assert_eq!(batches.len(), 1);
    let contents = std::fs::read_to_string(&batches[0]).unwrap();
    assert_eq!(contents.lines().count(), 2);
}

#[tokio::test]
async fn full_staging_buffer_drops_instead_of_blocking() {
    let root = TempDir::new().unwrap();
    let mut config = config(&root);
    config.staging_capacity = 2;
    let channel = DeliveryChannel::new(config);
    channel.start("session").unwrap();

    channel.post_event(event("a")).unwrap();
    channel.post_event(event("b")).unwrap();
    // Over capacity; accepted but dropped, never an error.
    channel.post_event(event("c")).unwrap();

    let snapshot = channel.metrics();
    assert_eq!(snapshot.events_accepted, 3);
    assert_eq!(snapshot.events_dropped, 1);
}

#[tokio::test]
async fn dispatcher_wraps_the_delivery_channel_as_its_processor() {
    let root = TempDir::new().unwrap();
    let channel = DeliveryChannel::new(config(&root));
    channel.start("session").unwrap();

    let dispatcher = ScheduledDispatcher::new(
        "buffered-delivery",
        DeliveryProcessor::new(Arc::clone(&channel)),
        Arc::new(NullPoster) as Arc<dyn EventPoster>,
    );
    dispatcher.start("session").unwrap();
    assert_eq!(dispatcher.transport_used().as_deref(), Some("https"));

    for name in ["one", "two", "three"] {
        dispatcher.post_event(event(name)).unwrap();
    }

    // Dispose drains the buffered remainder through the channel exactly
    // once, and the channel's own dispose persists it.
    let token = CancellationToken::new();
    token.cancel();
    dispatcher.dispose_and_transmit(token).await.unwrap();

    let snapshot = channel.metrics();
    assert_eq!(snapshot.events_accepted, 3);
    assert_eq!(snapshot.events_persisted, 3);
    assert_eq!(snapshot.events_dropped, 0);
}

#[tokio::test]
async fn discovered_strays_are_adopted_into_the_store() {
    let root = TempDir::new().unwrap();
    let legacy = TempDir::new().unwrap();
    std::fs::write(legacy.path().join("stray.pend.jsonl"), "{}\n").unwrap();

    let channel = DeliveryChannel::new(config(&root));
    channel.start("session").unwrap();

    let strays = crate::discovery::stray_pending_files_in(&[legacy.path().to_path_buf()]);
    assert_eq!(channel.adopt_stray_batches(&strays), 1);

    let store = channel.store.lock();
    let batches = store.as_ref().unwrap().sealed_batches().unwrap();
    assert_eq!(batches.len(), 1);
    assert!(batches[0].ends_with("stray.pend.jsonl"));
    assert!(!legacy.path().join("stray.pend.jsonl").exists());
}

#[tokio::test]
async fn dispose_flushes_and_releases_the_lock() {
    let root = TempDir::new().unwrap();
    let channel = DeliveryChannel::new(config(&root));
    channel.start("session").unwrap();
    channel.post_event(event("tail")).unwrap();

    // Cancelled token: the transmit is skipped but local resources are
    // still released and the tail event is persisted.
    let token = CancellationToken::new();
    token.cancel();
    channel.dispose_and_transmit(token.clone()).await.unwrap();

    assert!(channel.post_event(event("after")).is_err());
    assert_eq!(channel.metrics().events_persisted, 1);

    // The lock is free again; a fresh store sees the sealed batch.
    let store = crate::store::PendingStore::open(root.path(), "aif-key").unwrap();
    assert_eq!(store.sealed_batches().unwrap().len(), 1);

    // Idempotent: a second dispose is a no-op.
    channel.dispose_and_transmit(token).await.unwrap();
}
