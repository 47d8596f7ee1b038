//! Reconnecting SSE client.
//!
//! A started [`Client`] runs two tasks: a connector that keeps one HTTP
//! stream open (reconnecting under its [`ReconnectPolicy`]) and publishes
//! decoded events, and a dispatcher fanning those events out to observers.
//! Both live under the client's root cancellation token; closing the client
//! cancels it, which ends both tasks and closes every channel they own.

use crate::dispatcher::{Command, Dispatcher, SlowConsumerPolicy};
use crate::error::ClientError;
use crate::observer::{Observer, Subscription};
use crate::options::{ClientOptions, ReconnectPolicy};
use events::Event;
use futures_util::StreamExt;
use log::*;
use parking_lot::Mutex;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use reqwest::StatusCode;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::SendTimeoutError, error::TrySendError};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const EVENT_QUEUE_CAPACITY: usize = 1;
const ERROR_QUEUE_CAPACITY: usize = 1;
/// How long the final give-up error waits for the error slot to free up.
const FATAL_ERROR_GRACE: Duration = Duration::from_secs(1);

pub struct Client {
    url: String,
    http: reqwest::Client,
    options: ClientOptions,
    shutdown: CancellationToken,
    state: Mutex<State>,
}

// Channel halves waiting to be handed to the tasks or to the caller.
struct State {
    started: bool,
    events_tx: Option<mpsc::Sender<Event>>,
    events_rx: Option<mpsc::Receiver<Event>>,
    errors_tx: Option<mpsc::Sender<ClientError>>,
    errors_rx: Option<mpsc::Receiver<ClientError>>,
    commands: Option<mpsc::UnboundedSender<Command>>,
    commands_rx: Option<mpsc::UnboundedReceiver<Command>>,
}

impl Client {
    pub fn new(url: impl Into<String>, options: ClientOptions) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (errors_tx, errors_rx) = mpsc::channel(ERROR_QUEUE_CAPACITY);
        let (commands, commands_rx) = mpsc::unbounded_channel();

        Self {
            url: url.into(),
            http: reqwest::Client::new(),
            options,
            shutdown: CancellationToken::new(),
            state: Mutex::new(State {
                started: false,
                events_tx: Some(events_tx),
                events_rx: Some(events_rx),
                errors_tx: Some(errors_tx),
                errors_rx: Some(errors_rx),
                commands: Some(commands),
                commands_rx: Some(commands_rx),
            }),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Takes the raw stream of decoded events.
    ///
    /// Must be taken before [`Client::start`]; observers receive nothing once
    /// it is, since the dispatcher is then never started.
    pub fn events(&self) -> Option<mpsc::Receiver<Event>> {
        self.state.lock().events_rx.take()
    }

    /// Takes the error stream. It holds a single slot: errors arriving while
    /// it is occupied are logged and dropped.
    pub fn errors(&self) -> Option<mpsc::Receiver<ClientError>> {
        self.state.lock().errors_rx.take()
    }

    /// Drains the error stream into `handler` on a background task.
    /// Returns `false` if the error stream was already taken.
    pub fn on_error<F>(&self, mut handler: F) -> bool
    where
        F: FnMut(ClientError) + Send + 'static,
    {
        let Some(mut errors) = self.errors() else {
            warn!("Error stream already taken, handler not installed");
            return false;
        };

        tokio::spawn(async move {
            while let Some(err) = errors.recv().await {
                handler(err);
            }
        });
        true
    }

    /// Registers `observer` for fan-out. A closed client hands back an
    /// already-closed subscription.
    pub fn subscribe(&self, observer: Observer) -> Subscription {
        let (sink, subscription) = observer.open();

        match &self.state.lock().commands {
            Some(commands) => {
                if commands.send(Command::Add(sink)).is_err() {
                    debug!("Dispatcher stopped, observer closed");
                }
            }
            None => debug!("Client closed, observer closed"),
        }

        subscription
    }

    /// Starts connecting and returns once the first connection is validated.
    pub async fn start(&self) -> Result<(), ClientError> {
        let (ready_tx, ready_rx) = oneshot::channel();

        {
            let mut state = self.state.lock();
            if state.started {
                return Err(ClientError::AlreadyStarted);
            }
            state.started = true;

            let (Some(events), Some(errors)) = (state.events_tx.take(), state.errors_tx.take())
            else {
                return Err(ClientError::NeverConnected);
            };
            if self.shutdown.is_cancelled() {
                return Err(ClientError::NeverConnected);
            }

            match (state.events_rx.take(), state.commands_rx.take()) {
                (Some(events_rx), Some(commands_rx)) => {
                    let dispatcher =
                        Dispatcher::new(self.slow_consumer_policy(), self.shutdown.clone());
                    tokio::spawn(dispatcher.run(events_rx, commands_rx));
                }
                _ => debug!("Raw events taken, dispatcher not started"),
            }

            let connector = Connector {
                url: self.url.clone(),
                http: self.http.clone(),
                policy: self.options.reconnect.clone(),
                events,
                errors,
                shutdown: self.shutdown.clone(),
            };
            tokio::spawn(connector.run(ready_tx));
        }

        debug!("Waiting for first connection to {}", self.url);
        ready_rx.await.map_err(|_| ClientError::NeverConnected)
    }

    /// Closes the client. Safe to call more than once.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        if self.shutdown.is_cancelled() {
            return;
        }

        info!("Client shutting down");
        self.shutdown.cancel();

        // Halves never handed to a task close here.
        state.events_tx = None;
        state.errors_tx = None;
        state.commands = None;
        state.commands_rx = None;
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    fn slow_consumer_policy(&self) -> SlowConsumerPolicy {
        if self.options.drop_slow_consumer_msgs {
            SlowConsumerPolicy::Drop
        } else {
            SlowConsumerPolicy::Wait
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Keeps one stream open at a time and publishes what it decodes.
struct Connector {
    url: String,
    http: reqwest::Client,
    policy: ReconnectPolicy,
    events: mpsc::Sender<Event>,
    errors: mpsc::Sender<ClientError>,
    shutdown: CancellationToken,
}

impl Connector {
    async fn run(self, ready: oneshot::Sender<()>) {
        let mut ready = Some(ready);
        let mut failures: u32 = 0;
        let mut last_attempt: Option<Instant> = None;

        loop {
            if last_attempt.is_some_and(|at| at.elapsed() > self.policy.reset_after) {
                failures = 0;
            }
            last_attempt = Some(Instant::now());

            if let Err(err) = self.connect_and_listen(&mut ready).await {
                self.report(err);
            }
            if self.shutdown.is_cancelled() {
                break;
            }

            failures += 1;
            if self.policy.is_exhausted(failures) {
                error!("Giving up on {} after {failures} failed attempts", self.url);
                self.report_fatal().await;
                break;
            }

            info!("Reconnecting to {}...", self.url);
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.policy.backoff) => {}
            }
        }

        if !self.shutdown.is_cancelled() {
            info!("Client shutting down");
        }
        self.shutdown.cancel();
    }

    async fn connect_and_listen(
        &self,
        ready: &mut Option<oneshot::Sender<()>>,
    ) -> Result<(), ClientError> {
        let response = tokio::select! {
            _ = self.shutdown.cancelled() => return Ok(()),
            response = self.connect() => response?,
        };

        info!("Connected to {}", self.url);
        if let Some(ready) = ready.take() {
            let _ = ready.send(());
        }

        self.listen(response).await
    }

    async fn connect(&self) -> Result<reqwest::Response, ClientError> {
        let response = self
            .http
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .header(CONNECTION, "keep-alive")
            .send()
            .await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        if status != StatusCode::OK || content_type != "text/event-stream" {
            return Err(ClientError::InvalidResponse {
                status: status.as_u16(),
                content_type: content_type.to_string(),
            });
        }

        Ok(response)
    }

    async fn listen(&self, response: reqwest::Response) -> Result<(), ClientError> {
        let mut stream = Box::pin(events::decode(response.bytes_stream()));

        loop {
            let next = tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                next = stream.next() => next,
            };
            let Some(event) = next else {
                info!("Stream from {} ended", self.url);
                return Ok(());
            };
            let event = event?;

            tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                sent = self.events.send(event) => {
                    if sent.is_err() {
                        trace!("Raw event stream dropped, discarding event");
                    }
                }
            }
        }
    }

    fn report(&self, err: ClientError) {
        if self.shutdown.is_cancelled() {
            return;
        }

        warn!("SSE connection error: {err}");
        match self.errors.try_send(err) {
            Ok(()) => {}
            Err(TrySendError::Full(err)) => error!("Dropping error, channel full: {err}"),
            Err(TrySendError::Closed(_)) => debug!("Error stream dropped"),
        }
    }

    async fn report_fatal(&self) {
        match self
            .errors
            .send_timeout(ClientError::TooManyReconnects, FATAL_ERROR_GRACE)
            .await
        {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(err)) => error!("Dropping error, channel full: {err}"),
            Err(SendTimeoutError::Closed(_)) => debug!("Error stream dropped"),
        }
    }
}
