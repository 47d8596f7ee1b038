//! Reconnecting Server-Sent Events client with observer fan-out.
//!
//! # Example
//!
//! ```rust,ignore
//! let client = Client::new("http://localhost:3000/sse", ClientOptions::default());
//! let updates = client.subscribe(ObserverBuilder::new().on("update").limit(5).build()?);
//! client.start().await?;
//! let events = updates.wait_for_all().await;
//! client.shutdown();
//! ```

pub mod client;
pub(crate) mod dispatcher;
pub mod error;
pub mod observer;
pub mod options;

pub use client::Client;
pub use error::{ClientError, ObserverError};
pub use events::Event;
pub use observer::{no_heartbeat, Filter, Observer, ObserverBuilder, Subscription};
pub use options::{ClientOptions, ReconnectPolicy};
