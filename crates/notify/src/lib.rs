//! Beacon Notify
//!
//! In-process pub/sub over the live telemetry event stream. Subscribers
//! register a predicate and a handler; a single background dispatch loop
//! per service instance delivers matching events asynchronously, so the
//! hot posting path is never slowed and one subscriber's failure never
//! affects another.
//!
//! # Delivery
//!
//! The tap callback enqueues into an unbounded lock-free FIFO and sets a
//! re-armable [`ManualResetSignal`]; the dispatch loop waits, resets, then
//! drains the entire queue. Events reach subscribers in post order.
//!
//! # Fault isolation
//!
//! A matcher that panics is treated as permanently broken: its
//! subscription is removed and a diagnostic fault event with the stable
//! matcher-fault name is emitted. A handler that panics also produces a
//! diagnostic fault event, but the subscription survives unless it is
//! single-shot.

mod error;
mod service;
mod signal;
mod subscription;

pub use error::{NotifyError, Result};
pub use service::NotificationService;
pub use signal::ManualResetSignal;
pub use subscription::{EventHandler, Subscription};
