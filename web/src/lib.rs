//! HTTP surface of the event server.
//!
//! [`Server`] wires a `sse::Controller` into an axum router exposing the
//! configured SSE route, `POST /emit` and `GET /health`.

pub mod controller;
pub mod error;
pub mod router;
pub mod server;
pub(crate) mod sse;

pub use server::Server;
