use config::Config;
use sse::{Controller, ControllerOptions};
use std::sync::Arc;

pub mod config;
pub mod logging;
pub mod shutdown;

/// Runtime settings of one server instance, independent of argv parsing.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerOptions {
    pub interface: String,
    pub port: u16,
    /// Route serving the event stream.
    pub sse_url: String,
    pub controller: ControllerOptions,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            interface: "127.0.0.1".to_string(),
            port: 3000,
            sse_url: "/sse".to_string(),
            controller: ControllerOptions::default(),
        }
    }
}

impl From<&Config> for ServerOptions {
    fn from(config: &Config) -> Self {
        Self {
            interface: config.interface.clone(),
            port: config.port,
            sse_url: config.sse_url.clone(),
            controller: config.controller_options(),
        }
    }
}

// Service-level state shared by every request handler of one server.
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub sse_controller: Arc<Controller>,
    pub options: ServerOptions,
}

impl AppState {
    pub fn new(options: ServerOptions) -> Self {
        Self {
            sse_controller: Arc::new(Controller::new(options.controller.clone())),
            options,
        }
    }
}
