//! Beacon Channel
//!
//! The channel abstraction for the Beacon delivery pipeline, plus the
//! generic machinery shared by concrete channels:
//!
//! - [`TelemetryChannel`] - the lifecycle contract every delivery or
//!   observation sink implements
//! - [`Lifecycle`] - the Created → Started → Disposed atomic state machine
//! - [`TapPoint`] - the in-process attachment point for observers of the
//!   live event stream
//! - [`ScheduledDispatcher`] - buffering/draining engine around an inner
//!   [`EventProcessor`]
//! - [`WatsonReporter`] / [`WatsonThrottle`] - the sampling-gated crash
//!   report channel and its process-wide throttle state
//!
//! # Lifecycle contract
//!
//! `start` may be called at most once; a second call fails with
//! [`ChannelError::AlreadyStarted`]. Channels that require a started state
//! reject `post_event` before `start` with [`ChannelError::NotStarted`].
//! `dispose_and_transmit` is idempotent: a second call is a no-op and never
//! re-flushes.

mod channel;
mod dispatcher;
mod error;
mod lifecycle;
mod poster;
mod properties;
mod tap;
mod watson;

pub use channel::{RouteArgs, TelemetryChannel};
pub use dispatcher::{EventProcessor, ProcessorError, ScheduledDispatcher, DEFAULT_CADENCE};
pub use error::{ChannelError, Result};
pub use lifecycle::Lifecycle;
pub use poster::EventPoster;
pub use properties::ChannelProperties;
pub use tap::{TapCallback, TapPoint};
pub use watson::{WatsonConfig, WatsonReporter, WatsonThrottle};
