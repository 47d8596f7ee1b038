//! Fan-out of a client's raw events to its observers.
//!
//! The dispatcher task is the only owner of the observer list. New observers
//! arrive as [`Command::Add`] on its command queue; completed or abandoned
//! observers are dropped by the dispatcher itself, which closes their queues.
//!
//! Every observer sees an event before the next one is read. Under the
//! waiting policy a slow observer therefore delays the observers after it
//! for that same event.

use crate::observer::ObserverSink;
use events::Event;
use log::*;
use tokio::sync::mpsc::{self, error::SendTimeoutError, error::TrySendError};
use tokio_util::sync::CancellationToken;

pub(crate) enum Command {
    Add(ObserverSink),
}

/// What to do with an observer whose queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlowConsumerPolicy {
    /// Wait for capacity, shutdown, or the observer's own timeout.
    Wait,
    /// Skip the event for that observer.
    Drop,
}

enum Delivery {
    Delivered,
    Skipped,
    /// The consumer dropped its subscription.
    Abandoned,
    Shutdown,
}

pub(crate) struct Dispatcher {
    observers: Vec<ObserverSink>,
    policy: SlowConsumerPolicy,
    shutdown: CancellationToken,
}

impl Dispatcher {
    pub(crate) fn new(policy: SlowConsumerPolicy, shutdown: CancellationToken) -> Self {
        Self {
            observers: Vec::new(),
            policy,
            shutdown,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut events: mpsc::Receiver<Event>,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        let mut accepting = true;

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                command = commands.recv(), if accepting => match command {
                    Some(Command::Add(observer)) => self.observers.push(observer),
                    None => accepting = false,
                },
                event = events.recv() => match event {
                    Some(event) => {
                        if !self.dispatch(event).await {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }

        debug!("Dispatcher stopped, closing {} observers", self.observers.len());
    }

    /// Hands `event` to every matching observer. Returns `false` once the
    /// client is shutting down.
    async fn dispatch(&mut self, event: Event) -> bool {
        let mut finished = Vec::new();

        for (index, observer) in self.observers.iter_mut().enumerate() {
            if !observer.accepts(&event) {
                continue;
            }
            debug!("Consumed: {event}");

            let delivery = match self.policy {
                SlowConsumerPolicy::Wait => {
                    deliver_or_wait(observer, event.clone(), &self.shutdown).await
                }
                SlowConsumerPolicy::Drop => deliver_or_drop(observer, event.clone()),
            };

            match delivery {
                Delivery::Delivered => {
                    if observer.record_delivery() {
                        finished.push(index);
                    }
                }
                Delivery::Skipped => {}
                Delivery::Abandoned => finished.push(index),
                Delivery::Shutdown => return false,
            }
        }

        for index in finished.into_iter().rev() {
            debug!("Removing completed observer");
            self.observers.remove(index);
        }
        true
    }
}

async fn deliver_or_wait(
    observer: &ObserverSink,
    event: Event,
    shutdown: &CancellationToken,
) -> Delivery {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => Delivery::Shutdown,
        delivery = send(observer, event) => delivery,
    }
}

async fn send(observer: &ObserverSink, event: Event) -> Delivery {
    match observer.timeout {
        Some(timeout) => match observer.queue.send_timeout(event, timeout).await {
            Ok(()) => Delivery::Delivered,
            Err(SendTimeoutError::Timeout(event)) => {
                info!("Skipping event for observer after {timeout:?}: {event}");
                Delivery::Skipped
            }
            Err(SendTimeoutError::Closed(_)) => Delivery::Abandoned,
        },
        None => match observer.queue.send(event).await {
            Ok(()) => Delivery::Delivered,
            Err(_) => Delivery::Abandoned,
        },
    }
}

fn deliver_or_drop(observer: &ObserverSink, event: Event) -> Delivery {
    match observer.queue.try_send(event) {
        Ok(()) => Delivery::Delivered,
        Err(TrySendError::Full(event)) => {
            info!("Dropping event due to slow observer: {event}");
            Delivery::Skipped
        }
        Err(TrySendError::Closed(_)) => Delivery::Abandoned,
    }
}
