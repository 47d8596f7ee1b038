use clap::builder::TypedValueParser as _;
use clap::{Parser, ValueEnum};
use dotenvy::dotenv;
use log::LevelFilter;
use sse::{ControllerOptions, EmitStrategy};
use std::fmt;
use std::time::Duration;

/// Emission strategy as named on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EmitStrategyKind {
    /// Wait for a slow subscriber's queue to free up
    Block,
    /// Skip subscribers whose queue is full
    Drop,
    /// Wait up to `--emit-timeout-ms`, then skip
    Timeout,
}

impl fmt::Display for EmitStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EmitStrategyKind::Block => write!(f, "block"),
            EmitStrategyKind::Drop => write!(f, "drop"),
            EmitStrategyKind::Timeout => write!(f, "timeout"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: String,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 3000)]
    pub port: u16,

    /// Seconds between heartbeat events on every open stream
    #[arg(long, env, default_value_t = 20)]
    pub heartbeat_interval_secs: u64,

    /// Capacity of each connection's delivery queue. Values below 1 are treated as 1.
    #[arg(long, env, default_value_t = 1)]
    pub buffer_size: usize,

    /// What an emit does when a subscriber's queue is full
    #[arg(long, env, value_enum, default_value_t = EmitStrategyKind::Block)]
    pub emit_strategy: EmitStrategyKind,

    /// Bounded wait in milliseconds used by the `timeout` emit strategy
    #[arg(long, env, default_value_t = 20)]
    pub emit_timeout_ms: u64,

    /// Route serving the event stream
    #[arg(long, env, default_value = "/sse")]
    pub sse_url: String,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn emit_strategy(&self) -> EmitStrategy {
        match self.emit_strategy {
            EmitStrategyKind::Block => EmitStrategy::Block,
            EmitStrategyKind::Drop => EmitStrategy::Drop,
            EmitStrategyKind::Timeout => {
                EmitStrategy::Timeout(Duration::from_millis(self.emit_timeout_ms))
            }
        }
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            heartbeat_interval: self.heartbeat_interval(),
            buffer_size: self.buffer_size.max(1),
            emit_strategy: self.emit_strategy(),
        }
    }
}
