//! Server-Sent Events (SSE) delivery engine.
//!
//! This crate multiplexes one logical event stream to any number of
//! concurrently connected HTTP clients, each held open as a long-lived
//! streaming response.
//!
//! # Architecture
//!
//! - **Per-instance registry**: every `Controller` owns its own
//!   `SubscriberRegistry`; nothing is process-global, so several servers can
//!   run side by side.
//! - **Server-generated connection ids**: each accepted connection gets a
//!   fresh `ConnectionId` that is threaded through accept, register and
//!   cleanup.
//! - **Emission strategies**: `Block`, `Drop` or `Timeout` decide what a
//!   broadcast does with a subscriber whose queue is full.
//! - **Ephemeral messages**: events are best-effort and at-most-once per
//!   connection; a disconnected client misses what was sent meanwhile.
//!
//! # Message Flow
//!
//! 1. Client opens the streaming route, handled by `Controller::subscribe`
//! 2. Controller writes an immediate heartbeat and starts the heartbeat ticker
//! 3. The connection's queue is registered under its `ConnectionId`
//! 4. A producer calls `Controller::emit`
//!    - Registry offers the event to every queue using the strategy
//!    - Each connection loop encodes what it receives and flushes it
//! 5. On disconnect or `Controller::shutdown` the ticker stops, the handler
//!    scope is cancelled, the queue is closed and the registration removed
//!
//! # Example: Emitting an event
//!
//! ```rust,ignore
//! use events::Event;
//!
//! let delivered = app_state.sse_controller.emit(Event::named("update", "payload")).await;
//! ```
//!
//! # Modules
//!
//! - `connection`: `ConnectionId` and the `SubscriberRegistry`
//! - `controller`: streaming middleware, emit and shutdown
//! - `strategy`: backpressure policies

pub mod connection;
pub mod controller;
pub mod strategy;

pub use connection::{ConnectionId, SubscriberRegistry};
pub use controller::{ConnectionContext, Controller, ControllerOptions};
pub use strategy::EmitStrategy;
