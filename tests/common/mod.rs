//! Boots a real server on a random port and a client pointed at its stream.

#![allow(dead_code)]

use service::ServerOptions;
use sse_client::{Client, ClientOptions};
use std::io;
use std::time::Duration;
use tokio::task::JoinHandle;
use web::Server;

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestEnv {
    pub server: Server,
    pub client: Client,
    pub base_url: String,
    handle: JoinHandle<io::Result<()>>,
}

impl TestEnv {
    pub async fn new(options: ServerOptions) -> Self {
        Self::with_client_options(options, ClientOptions::default()).await
    }

    pub async fn with_client_options(options: ServerOptions, client_options: ClientOptions) -> Self {
        let server = Server::new(options);
        let (base_url, handle) = server
            .listen_and_serve_on_random_port()
            .await
            .expect("server should bind a random port");
        let client = Client::new(format!("{base_url}/sse"), client_options);

        Self {
            server,
            client,
            base_url,
            handle,
        }
    }

    /// Starts the client and waits until the server has registered it.
    pub async fn start_client(&self) {
        self.client
            .start()
            .await
            .expect("client should connect");
        self.wait_for_subscribers(1).await;
    }

    pub async fn wait_for_subscribers(&self, count: usize) {
        tokio::time::timeout(WAIT_TIMEOUT, async {
            while self.server.controller().subscriber_count() != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("subscriber should register");
    }

    pub async fn teardown(self) {
        self.client.shutdown();
        self.server.shutdown();
        self.handle
            .await
            .expect("server task should not panic")
            .expect("server should stop cleanly");
    }
}
