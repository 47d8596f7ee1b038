//! Filtered, optionally bounded views over a client's event stream.

use crate::error::{ClientError, ObserverError};
use events::Event;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;

/// Predicate deciding whether an event is handed to an observer.
pub type Filter = Box<dyn Fn(&Event) -> bool + Send + Sync>;

/// Filter applied to every observer built without
/// [`ObserverBuilder::include_heartbeat`].
pub fn no_heartbeat(event: &Event) -> bool {
    !event.is_heartbeat()
}

#[derive(Default)]
pub struct ObserverBuilder {
    filters: Vec<Filter>,
    close_on_first: bool,
    limit: Option<usize>,
    buffer: usize,
    include_heartbeat: bool,
    timeout: Option<Duration>,
}

impl ObserverBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only events named `name`.
    pub fn on(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.filter(move |event| event.event_type() == Some(name.as_str()))
    }

    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.filters.push(Box::new(filter));
        self
    }

    /// Close after the first delivered event.
    pub fn first(mut self) -> Self {
        self.close_on_first = true;
        self
    }

    /// Close after `limit` delivered events. Must be at least 1.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Queue capacity, letting a slow consumer fall behind without losing
    /// events. Zero behaves like a single-slot hand-off.
    pub fn buffer(mut self, count: usize) -> Self {
        self.buffer = count;
        self
    }

    pub fn include_heartbeat(mut self) -> Self {
        self.include_heartbeat = true;
        self
    }

    /// Longest a waiting delivery may block on this observer before the
    /// event is skipped for it.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<Observer, ObserverError> {
        if let Some(limit) = self.limit {
            if limit < 1 {
                return Err(ObserverError::InvalidLimit(limit));
            }
        }

        let mut filters = self.filters;
        if !self.include_heartbeat {
            filters.push(Box::new(no_heartbeat));
        }

        Ok(Observer {
            filters,
            close_on_first: self.close_on_first,
            limit: self.limit,
            buffer: self.buffer,
            timeout: self.timeout,
        })
    }
}

/// A validated observer configuration, ready to be subscribed to a client.
pub struct Observer {
    filters: Vec<Filter>,
    close_on_first: bool,
    limit: Option<usize>,
    buffer: usize,
    timeout: Option<Duration>,
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Observer")
            .field("filters", &self.filters.len())
            .field("close_on_first", &self.close_on_first)
            .field("limit", &self.limit)
            .field("buffer", &self.buffer)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Observer {
    pub fn builder() -> ObserverBuilder {
        ObserverBuilder::new()
    }

    /// Splits into the dispatcher-side sink and the consumer-side subscription.
    pub(crate) fn open(self) -> (ObserverSink, Subscription) {
        let (queue, events) = mpsc::channel(self.buffer.max(1));
        let sink = ObserverSink {
            filters: self.filters,
            close_on_first: self.close_on_first,
            limit: self.limit,
            timeout: self.timeout,
            emitted: 0,
            queue,
        };
        (sink, Subscription { events })
    }
}

/// Dispatcher-owned half of an observer. Dropping it closes the queue.
pub(crate) struct ObserverSink {
    filters: Vec<Filter>,
    close_on_first: bool,
    limit: Option<usize>,
    pub(crate) timeout: Option<Duration>,
    emitted: usize,
    pub(crate) queue: mpsc::Sender<Event>,
}

impl ObserverSink {
    pub(crate) fn accepts(&self, event: &Event) -> bool {
        self.filters.iter().all(|filter| filter(event))
    }

    /// Counts one delivery and reports whether the observer is now complete.
    pub(crate) fn record_delivery(&mut self) -> bool {
        self.emitted += 1;
        self.close_on_first || self.limit.is_some_and(|limit| self.emitted >= limit)
    }
}

/// Consumer side of a subscribed observer.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::Receiver<Event>,
}

impl Subscription {
    /// Next delivered event, or `None` once the observer is closed.
    pub async fn recv(&mut self) -> Option<Event> {
        self.events.recv().await
    }

    /// Every delivered event, in order, once the observer closes.
    pub async fn wait_for_all(mut self) -> Vec<Event> {
        let mut received = Vec::new();
        while let Some(event) = self.events.recv().await {
            received.push(event);
        }
        received
    }

    /// Like [`Subscription::wait_for_all`] but gives up after `duration`,
    /// discarding whatever arrived so far.
    pub async fn wait_for_all_or_timeout(
        self,
        duration: Duration,
    ) -> Result<Vec<Event>, ClientError> {
        tokio::time::timeout(duration, self.wait_for_all())
            .await
            .map_err(|_| ClientError::Timeout(duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_rejects_zero_limit() {
        let err = ObserverBuilder::new().limit(0).build().unwrap_err();
        assert_eq!(err, ObserverError::InvalidLimit(0));
    }

    #[test]
    fn test_default_observer_skips_heartbeats() {
        let (sink, _subscription) = ObserverBuilder::new().build().unwrap().open();

        assert!(!sink.accepts(&Event::heartbeat("now")));
        assert!(sink.accepts(&Event::new("payload")));
    }

    #[test]
    fn test_include_heartbeat_accepts_heartbeats() {
        let (sink, _subscription) = ObserverBuilder::new()
            .include_heartbeat()
            .build()
            .unwrap()
            .open();

        assert!(sink.accepts(&Event::heartbeat("now")));
    }

    #[test]
    fn test_on_matches_event_name_only() {
        let (sink, _subscription) = ObserverBuilder::new().on("Custom").build().unwrap().open();

        assert!(sink.accepts(&Event::named("Custom", "x")));
        assert!(!sink.accepts(&Event::named("Other", "x")));
        assert!(!sink.accepts(&Event::new("x")));
    }

    #[test]
    fn test_filters_are_all_required() {
        let (sink, _subscription) = ObserverBuilder::new()
            .filter(|event| event.data.starts_with("keep"))
            .filter(|event| event.id.is_some())
            .build()
            .unwrap()
            .open();

        assert!(sink.accepts(&Event::new("keep").with_id("1")));
        assert!(!sink.accepts(&Event::new("keep")));
        assert!(!sink.accepts(&Event::new("drop").with_id("1")));
    }

    #[test]
    fn test_limit_completes_after_exactly_k() {
        let (mut sink, _subscription) = ObserverBuilder::new().limit(3).build().unwrap().open();

        assert!(!sink.record_delivery());
        assert!(!sink.record_delivery());
        assert!(sink.record_delivery());
    }

    #[test]
    fn test_first_completes_immediately() {
        let (mut sink, _subscription) = ObserverBuilder::new().first().build().unwrap().open();
        assert!(sink.record_delivery());
    }

    #[test]
    fn test_unbounded_observer_never_completes() {
        let (mut sink, _subscription) = ObserverBuilder::new().build().unwrap().open();
        for _ in 0..100 {
            assert!(!sink.record_delivery());
        }
    }

    #[tokio::test]
    async fn test_wait_for_all_returns_in_order_once_closed() {
        let (sink, subscription) = ObserverBuilder::new().buffer(3).build().unwrap().open();

        for data in ["a", "b", "c"] {
            sink.queue.send(Event::new(data)).await.unwrap();
        }
        drop(sink);

        let data: Vec<String> = subscription
            .wait_for_all()
            .await
            .into_iter()
            .map(|event| event.data)
            .collect();
        assert_eq!(data, vec!["a", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_all_or_timeout_discards_partial_results() {
        let (sink, subscription) = ObserverBuilder::new().buffer(2).build().unwrap().open();
        sink.queue.send(Event::new("partial")).await.unwrap();

        let result = subscription
            .wait_for_all_or_timeout(Duration::from_millis(100))
            .await;

        assert!(matches!(result, Err(ClientError::Timeout(_))));
        drop(sink);
    }
}
