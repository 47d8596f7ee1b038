//! Backpressure policies applied when broadcasting to a full subscriber queue.

use events::Event;
use std::time::Duration;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio::sync::mpsc::Sender;

/// Bounded wait used by `EmitStrategy::Timeout` unless configured otherwise.
pub const DEFAULT_EMIT_TIMEOUT: Duration = Duration::from_millis(20);

/// How a broadcast treats a subscriber whose queue is full.
///
/// Fixed for the lifetime of a `Controller` and applied to every subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmitStrategy {
    /// Wait for capacity. A slow consumer stalls the caller of `emit`.
    #[default]
    Block,
    /// Skip a full queue without waiting.
    Drop,
    /// Wait at most the given duration, then skip.
    Timeout(Duration),
}

/// Outcome of offering one event to one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Full,
    TimedOut,
    /// The connection went away; its queue no longer has a reader.
    Closed,
}

impl EmitStrategy {
    /// `Timeout` with the default bounded wait.
    pub fn timeout() -> Self {
        EmitStrategy::Timeout(DEFAULT_EMIT_TIMEOUT)
    }

    pub(crate) async fn deliver(&self, queue: &Sender<Event>, event: Event) -> Delivery {
        match self {
            EmitStrategy::Block => match queue.send(event).await {
                Ok(()) => Delivery::Delivered,
                Err(_) => Delivery::Closed,
            },
            EmitStrategy::Drop => match queue.try_send(event) {
                Ok(()) => Delivery::Delivered,
                Err(TrySendError::Full(_)) => Delivery::Full,
                Err(TrySendError::Closed(_)) => Delivery::Closed,
            },
            EmitStrategy::Timeout(wait) => match queue.send_timeout(event, *wait).await {
                Ok(()) => Delivery::Delivered,
                Err(SendTimeoutError::Timeout(_)) => Delivery::TimedOut,
                Err(SendTimeoutError::Closed(_)) => Delivery::Closed,
            },
        }
    }
}
