use anyhow::Context;
use log::*;
use service::{config::Config, logging::Logger, shutdown::watch_terminate, ServerOptions};
use web::Server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::new();
    Logger::init_logger(&config).context("failed to initialize logger")?;

    info!(
        "Starting SSE server: stream on {}, heartbeat every {}s, {} emission",
        config.sse_url, config.heartbeat_interval_secs, config.emit_strategy
    );

    let server = Server::new(ServerOptions::from(&config));
    let terminate = watch_terminate();

    server
        .listen_and_serve(terminate)
        .await
        .context("server failed")?;

    info!("Bye");
    Ok(())
}
