//! SSE HTTP handler for the web layer.
//!
//! This module contains only the Axum handler for the streaming route.
//! The delivery engine (Controller, SubscriberRegistry, EmitStrategy)
//! lives in the `sse` crate.

pub mod handler;
