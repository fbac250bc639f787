//! Atomic channel lifecycle state machine.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::{ChannelError, Result};

const CREATED: u8 = 0;
const STARTED: u8 = 1;
const DISPOSED: u8 = 2;

/// Created → Started → Disposed, enforced with compare-and-swap so the
/// contract holds under concurrent callers.
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
}

impl Lifecycle {
    /// New lifecycle in the Created state.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(CREATED),
        }
    }

    /// Transition Created → Started.
    ///
    /// A second call fails with [`ChannelError::AlreadyStarted`]; a call
    /// after dispose fails with [`ChannelError::Disposed`].
    pub fn begin_start(&self) -> Result<()> {
        match self
            .state
            .compare_exchange(CREATED, STARTED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(()),
            Err(DISPOSED) => Err(ChannelError::Disposed),
            Err(_) => Err(ChannelError::AlreadyStarted),
        }
    }

    /// Transition to Disposed from any state.
    ///
    /// Returns true only for the first call, so dispose work runs exactly
    /// once and later calls are no-ops.
    pub fn mark_disposed(&self) -> bool {
        self.state.swap(DISPOSED, Ordering::AcqRel) != DISPOSED
    }

    /// Whether the channel is currently started.
    #[inline]
    pub fn is_started(&self) -> bool {
        self.state.load(Ordering::Acquire) == STARTED
    }

    /// Whether the channel has been disposed.
    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.state.load(Ordering::Acquire) == DISPOSED
    }

    /// Fail with [`ChannelError::NotStarted`] unless started.
    pub fn require_started(&self) -> Result<()> {
        if self.is_started() {
            Ok(())
        } else {
            Err(ChannelError::NotStarted)
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "lifecycle_test.rs"]
mod lifecycle_test;
