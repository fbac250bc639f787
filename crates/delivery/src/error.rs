//! Error types for the delivery crate

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the persisted store and the sender.
///
/// None of these ever reach a `post_event` caller: steady-state failures
/// are retried silently by the background sender, and shutdown failures
/// are swallowed.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// Storage I/O failed
    #[error("storage i/o: {0}")]
    Io(#[from] std::io::Error),

    /// Another process holds the storage folder lock
    #[error("storage lock held at {path}")]
    LockHeld {
        /// Path of the contested lock file
        path: PathBuf,
    },

    /// Network transmit failed
    #[error("network: {0}")]
    Network(String),

    /// Collection endpoint refused the batch
    #[error("endpoint returned status {0}")]
    Server(u16),
}

/// Result type for delivery operations
pub type Result<T> = std::result::Result<T, DeliveryError>;
