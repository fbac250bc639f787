//! Error types for the channel crate

use thiserror::Error;

/// Errors raised by channel lifecycle and posting contracts.
///
/// These are usage/contract violations: they surface synchronously to the
/// caller and are never retried internally.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// `start` was called more than once
    #[error("channel already started")]
    AlreadyStarted,

    /// A start-required operation ran before `start`
    #[error("channel not started")]
    NotStarted,

    /// The channel was already disposed
    #[error("channel disposed")]
    Disposed,

    /// Routed post on a channel that is never reached via routing
    #[error("channel {channel_id} does not accept routed events")]
    NotRoutable {
        /// Id of the refusing channel
        channel_id: String,
    },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Local resources could not be acquired during `start`
    #[error("channel failed to start: {0}")]
    Startup(String),
}

/// Result type for channel operations
pub type Result<T> = std::result::Result<T, ChannelError>;
