use crate::router::define_routes;
use axum::Router;
use events::Event;
use log::*;
use service::{AppState, ServerOptions};
use sse::Controller;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// HTTP front of one event stream: the SSE route, `POST /emit` and `/health`.
///
/// Clones share the same controller and shutdown trigger.
#[derive(Clone)]
pub struct Server {
    app_state: AppState,
    router: Router,
    shutdown: CancellationToken,
}

impl Server {
    pub fn new(options: ServerOptions) -> Self {
        Self::with_routes(options, Router::new())
    }

    /// Builds a server whose router also carries `extra_routes`.
    pub fn with_routes(options: ServerOptions, extra_routes: Router) -> Self {
        let app_state = AppState::new(options);
        let router = define_routes(app_state.clone()).merge(extra_routes);

        Self {
            app_state,
            router,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn controller(&self) -> &Arc<Controller> {
        &self.app_state.sse_controller
    }

    pub fn options(&self) -> &ServerOptions {
        &self.app_state.options
    }

    /// Broadcasts `event` to every connected client, returning how many got it.
    pub async fn emit(&self, event: Event) -> usize {
        self.app_state.sse_controller.emit(event).await
    }

    /// Ends every open stream and stops accepting connections. Idempotent.
    pub fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        info!("Shutting down server");
        self.app_state.sse_controller.shutdown();
        self.shutdown.cancel();
    }

    /// Serves on the configured interface and port until `signal` resolves
    /// or [`Server::shutdown`] is called.
    pub async fn listen_and_serve<F>(&self, signal: F) -> io::Result<()>
    where
        F: Future + Send + 'static,
    {
        let options = self.options();
        let listener = TcpListener::bind((options.interface.as_str(), options.port)).await?;
        info!("Server starting... listening for connections on http://{}", listener.local_addr()?);

        self.serve(listener, signal).await
    }

    /// Binds an ephemeral port on the configured interface and serves in the
    /// background. Returns the client-reachable base URL and the serving task.
    pub async fn listen_and_serve_on_random_port(
        &self,
    ) -> io::Result<(String, JoinHandle<io::Result<()>>)> {
        let listener = TcpListener::bind((self.options().interface.as_str(), 0)).await?;
        let url = base_url(listener.local_addr()?);
        info!("Server listening on {url}");

        let server = self.clone();
        let handle = tokio::spawn(async move {
            server
                .serve(listener, std::future::pending::<()>())
                .await
        });

        Ok((url, handle))
    }

    async fn serve<F>(&self, listener: TcpListener, signal: F) -> io::Result<()>
    where
        F: Future + Send + 'static,
    {
        let shutdown = self.shutdown.clone();
        let controller = self.app_state.sse_controller.clone();

        axum::serve(listener, self.router.clone())
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = signal => {},
                    _ = shutdown.cancelled() => {},
                }
                // Open streams never end on their own.
                controller.shutdown();
            })
            .await?;

        info!("Server stopped");
        Ok(())
    }
}

/// Wildcard listen addresses are reported as `localhost`.
fn base_url(addr: SocketAddr) -> String {
    if addr.ip().is_unspecified() {
        format!("http://localhost:{}", addr.port())
    } else {
        format!("http://{addr}")
    }
}
