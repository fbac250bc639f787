//! Error types for the session crate

use thiserror::Error;

/// Errors surfaced by session lifecycle operations.
///
/// Only contract violations surface here; posting never returns an
/// error, and per-channel failures during fan-out are logged and
/// isolated.
#[derive(Error, Debug)]
pub enum SessionError {
    /// A channel lifecycle contract was violated
    #[error(transparent)]
    Channel(#[from] beacon_channel::ChannelError),
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;
