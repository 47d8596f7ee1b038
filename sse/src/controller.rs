use crate::connection::{ConnectionId, SubscriberRegistry};
use crate::strategy::EmitStrategy;
use axum::body::Body;
use axum::http::header::{self, HeaderValue};
use axum::response::Response;
use events::Event;
use log::*;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);
pub const DEFAULT_BUFFER_SIZE: usize = 1;

// Hand-off queue between a connection's handler and its response stream.
const DATA_QUEUE_CAPACITY: usize = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerOptions {
    pub heartbeat_interval: Duration,
    /// Capacity of each subscriber's delivery queue.
    pub buffer_size: usize,
    pub emit_strategy: EmitStrategy,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            buffer_size: DEFAULT_BUFFER_SIZE,
            emit_strategy: EmitStrategy::default(),
        }
    }
}

/// What a connection handler gets to know about its connection.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub connection_id: ConnectionId,
    /// Cancelled when the peer disconnects or the controller shuts down.
    pub cancel: CancellationToken,
}

/// Owns the subscriber registry of one server and turns accepted requests
/// into long-lived SSE responses.
pub struct Controller {
    registry: Arc<SubscriberRegistry>,
    options: ControllerOptions,
    shutdown: CancellationToken,
}

impl Controller {
    pub fn new(options: ControllerOptions) -> Self {
        let mut options = options;
        if options.heartbeat_interval.is_zero() {
            options.heartbeat_interval = DEFAULT_HEARTBEAT_INTERVAL;
        }
        if options.buffer_size == 0 {
            options.buffer_size = DEFAULT_BUFFER_SIZE;
        }

        Self {
            registry: Arc::new(SubscriberRegistry::new()),
            options,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }

    /// Wraps `handler` into a streaming SSE response.
    ///
    /// The response starts with an immediate heartbeat, then carries a
    /// heartbeat every `heartbeat_interval` plus every event the handler sends.
    /// `handler` runs on its own task with a cancellation scope derived from
    /// the controller's; the scope is cancelled and the data queue closed
    /// whenever the stream ends, whether the peer left, the handler finished
    /// or the controller shut down.
    pub fn middleware<H, Fut>(&self, handler: H) -> Response
    where
        H: FnOnce(ConnectionContext, mpsc::Sender<Event>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let connection_id = ConnectionId::new();
        let handler_scope = self.shutdown.child_token();
        let (data_tx, mut data_rx) = mpsc::channel(DATA_QUEUE_CAPACITY);

        info!("Client connected: {connection_id}");

        tokio::spawn(handler(
            ConnectionContext {
                connection_id: connection_id.clone(),
                cancel: handler_scope.clone(),
            },
            data_tx,
        ));

        let guard = ConnectionGuard {
            connection_id: connection_id.clone(),
            handler_scope,
        };
        let shutdown = self.shutdown.clone();
        let interval = self.options.heartbeat_interval;

        let stream = async_stream::stream! {
            let _guard = guard;

            yield Ok::<_, Infallible>(heartbeat().encode());

            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                let next = tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Received shutdown for SSE connection {connection_id}");
                        None
                    }
                    _ = ticker.tick() => Some(heartbeat()),
                    event = data_rx.recv() => event,
                };

                match next {
                    Some(event) => yield Ok(event.encode()),
                    None => break,
                }
            }
        };

        let mut response = Response::new(Body::from_stream(stream));
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/event-stream"),
        );
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, OPTIONS"),
        );
        response
    }

    /// Streaming response whose connection is registered as a broadcast
    /// subscriber for as long as it stays open.
    pub fn subscribe(&self) -> Response {
        let registry = Arc::clone(&self.registry);
        let buffer_size = self.options.buffer_size;

        self.middleware(move |connection, response| {
            forward_subscriber(registry, buffer_size, connection, response)
        })
    }

    /// Broadcast `event` to every open connection using the configured
    /// strategy. Returns how many connections accepted it.
    pub async fn emit(&self, event: Event) -> usize {
        let total = self.registry.len();
        let delivered = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => 0,
            delivered = self.registry.broadcast(&event, self.options.emit_strategy) => delivered,
        };

        info!("Emitted: '{event}' to {delivered}/{total} subscribers");
        delivered
    }

    /// Ends every open stream. Safe to call more than once.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!("Shutting down SSE controller");
        }
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn has_subscriber(&self, connection_id: &ConnectionId) -> bool {
        self.registry.has_subscriber(connection_id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(ControllerOptions::default())
    }
}

fn heartbeat() -> Event {
    Event::heartbeat(chrono::Utc::now().to_rfc3339())
}

// Runs the connection cleanup when the response stream is dropped.
struct ConnectionGuard {
    connection_id: ConnectionId,
    handler_scope: CancellationToken,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.handler_scope.cancel();
        info!("Client disconnected: {}", self.connection_id);
    }
}

// Deregisters a subscriber on every exit path of its handler.
struct Registration {
    registry: Arc<SubscriberRegistry>,
    connection_id: ConnectionId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        debug!("Subscriber {}: cleaning up", self.connection_id);
        self.registry.delete(&self.connection_id);
    }
}

async fn forward_subscriber(
    registry: Arc<SubscriberRegistry>,
    buffer_size: usize,
    connection: ConnectionContext,
    response: mpsc::Sender<Event>,
) {
    let (queue, mut subscription) = mpsc::channel(buffer_size);

    if registry.has_subscriber(&connection.connection_id) {
        warn!(
            "Existing subscriber {} should not exist, overriding it",
            connection.connection_id
        );
    }
    registry.store(connection.connection_id.clone(), queue);
    let _registration = Registration {
        registry,
        connection_id: connection.connection_id.clone(),
    };

    loop {
        let event = tokio::select! {
            _ = connection.cancel.cancelled() => break,
            event = subscription.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        tokio::select! {
            sent = response.send(event) => {
                if sent.is_err() {
                    break;
                }
            }
            _ = connection.cancel.cancelled() => break,
        }
    }
}
