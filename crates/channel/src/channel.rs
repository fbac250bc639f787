//! The channel trait - lifecycle contract for every delivery or
//! observation sink.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use beacon_events::TelemetryEvent;

use crate::error::{ChannelError, Result};
use crate::properties::ChannelProperties;

/// Arguments carried by a routed post (rule-driven delivery).
#[derive(Debug, Clone, Default)]
pub struct RouteArgs {
    args: HashMap<String, String>,
}

impl RouteArgs {
    /// Empty route arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style argument setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// Look up a route argument.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.args.get(key).map(String::as_str)
    }
}

/// A delivery or observation sink that receives every posted telemetry
/// event and decides independently what to do with it.
///
/// # Contract
///
/// - `start` at most once; a second call is [`ChannelError::AlreadyStarted`]
/// - `post_event` before `start` fails on start-required channels; stateless
///   taps may treat it as a no-op
/// - `dispose_and_transmit` is idempotent and must release all locally
///   owned resources even when the token cancels the network transmit
#[async_trait]
pub trait TelemetryChannel: Send + Sync {
    /// Stable channel identifier.
    fn channel_id(&self) -> &str;

    /// Property flags governing when this channel is active.
    fn properties(&self) -> ChannelProperties;

    /// Whether `start` has completed and the channel is accepting events.
    fn is_started(&self) -> bool;

    /// The resolved transport, computed exactly once during `start`.
    /// `None` before `start` completes.
    fn transport_used(&self) -> Option<String> {
        None
    }

    /// The distinguishable sub-transport, if one exists.
    fn try_get_transport(&self) -> Option<String> {
        self.transport_used()
    }

    /// Start the channel for the given session. At most once.
    fn start(&self, session_id: &str) -> Result<()>;

    /// Post an event to the channel. Non-blocking; transport and storage
    /// failures are never surfaced here.
    fn post_event(&self, event: Arc<TelemetryEvent>) -> Result<()>;

    /// Post an event through the routing path.
    ///
    /// Channels that are never reached via routing refuse this with
    /// [`ChannelError::NotRoutable`].
    fn post_routed_event(&self, event: Arc<TelemetryEvent>, route_args: &RouteArgs) -> Result<()> {
        let _ = (event, route_args);
        Err(ChannelError::NotRoutable {
            channel_id: self.channel_id().to_string(),
        })
    }

    /// Stop accepting input, flush what remains best-effort under the
    /// token, and release all local resources. Idempotent.
    async fn dispose_and_transmit(&self, token: CancellationToken) -> Result<()>;
}
