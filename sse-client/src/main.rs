use anyhow::Result;
use clap::Parser;
use colored::*;
use sse_client::{Client, ClientOptions, Event, ObserverBuilder};

#[derive(Parser)]
#[command(name = "sse-client")]
#[command(about = "Print events streamed by an SSE server")]
struct Cli {
    /// Streaming endpoint to connect to
    #[arg(long, default_value = "http://localhost:3000/sse")]
    url: String,

    /// Skip events instead of waiting when output falls behind
    #[arg(long)]
    drop_slow_consumer_msgs: bool,

    /// Only print events with this name
    #[arg(long)]
    on: Option<String>,

    /// Exit after this many events
    #[arg(long)]
    limit: Option<usize>,

    /// Print heartbeats too
    #[arg(long)]
    include_heartbeat: bool,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,

    #[arg(long, default_value = "info")]
    log_level: log::LevelFilter,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(cli.log_level)
        .init();

    let client = Client::new(
        cli.url.clone(),
        ClientOptions {
            drop_slow_consumer_msgs: cli.drop_slow_consumer_msgs,
            ..ClientOptions::default()
        },
    );

    let mut builder = ObserverBuilder::new();
    if let Some(name) = &cli.on {
        builder = builder.on(name.clone());
    }
    if let Some(limit) = cli.limit {
        builder = builder.limit(limit);
    }
    if cli.include_heartbeat {
        builder = builder.include_heartbeat();
    }
    let mut subscription = client.subscribe(builder.build()?);

    client.on_error(|err| eprintln!("{} {}", "✗".red(), err.to_string().red()));

    println!("{} Connecting to {}...", "→".blue(), cli.url);
    client.start().await?;
    println!("{} Connected", "✓".green());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = subscription.recv() => match event {
                Some(event) => print_event(&event, cli.json)?,
                None => break,
            },
        }
    }

    client.shutdown();
    Ok(())
}

fn print_event(event: &Event, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }

    let name = event.event_type().unwrap_or("message");
    let name = if event.is_heartbeat() {
        name.dimmed()
    } else {
        name.cyan().bold()
    };
    match &event.id {
        Some(id) => println!("{} [{}] {}", name, id.yellow(), event.data),
        None => println!("{} {}", name, event.data),
    }
    Ok(())
}
