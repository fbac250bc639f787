//! Transport seam for the delivery channel.
//!
//! A host may plug in a preferred native telemetry service; when none is
//! available the channel falls back to the direct HTTPS endpoint backed
//! by the on-disk persisted queue.

use std::sync::Arc;

use beacon_events::TelemetryEvent;

/// A preferred high-throughput native transport (an OS telemetry
/// service or similar host facility).
pub trait NativeTransport: Send + Sync {
    /// Stable sub-transport name reported to transport queries.
    fn name(&self) -> &str;

    /// Probe availability on this host. Called once, during `start`.
    fn is_available(&self) -> bool;

    /// Hand one event to the native service. Durability past this point
    /// is the native service's concern.
    fn send(&self, event: &TelemetryEvent);
}

/// The transport resolved exactly once during `start`.
#[derive(Clone)]
pub(crate) enum ResolvedTransport {
    /// Events go to the plugged-in native service.
    Native(Arc<dyn NativeTransport>),
    /// Events are persisted locally and uploaded over HTTPS.
    DirectHttps,
}

impl ResolvedTransport {
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Native(transport) => format!("native/{}", transport.name()),
            Self::DirectHttps => "https".to_owned(),
        }
    }

    /// The distinguishable sub-transport, if one exists. The HTTPS
    /// fallback has none.
    pub(crate) fn sub_transport(&self) -> Option<String> {
        match self {
            Self::Native(transport) => Some(transport.name().to_owned()),
            Self::DirectHttps => None,
        }
    }
}

impl std::fmt::Debug for ResolvedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}
