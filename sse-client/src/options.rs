use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);
pub const DEFAULT_RESET_AFTER: Duration = Duration::from_secs(60);

/// Bounded fixed-delay reconnection.
///
/// The failure counter grows by one after every attempt that ends, and is
/// reset when more than `reset_after` passed since the previous attempt
/// started. The client gives up once the counter exceeds `max_retries`,
/// i.e. after `max_retries + 1` consecutive failed attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
    pub reset_after: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_BACKOFF,
            reset_after: DEFAULT_RESET_AFTER,
        }
    }
}

impl ReconnectPolicy {
    pub(crate) fn is_exhausted(&self, failures: u32) -> bool {
        failures > self.max_retries
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientOptions {
    /// Skip events for observers whose queue is full instead of waiting.
    pub drop_slow_consumer_msgs: bool,
    pub reconnect: ReconnectPolicy,
}
