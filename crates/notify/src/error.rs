//! Error types for the notify crate

use thiserror::Error;

/// Errors raised by the notification service.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Rebinding the session with live subscriptions
    #[error("cannot rebind session while {live} subscriptions are live")]
    SessionBound {
        /// Number of live subscriptions blocking the rebind
        live: usize,
    },

    /// Subscribing before a session was bound
    #[error("notification service is not bound to a session")]
    NotBound,
}

/// Result type for notify operations
pub type Result<T> = std::result::Result<T, NotifyError>;
