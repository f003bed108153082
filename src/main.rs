//! echo-bench: a TCP ping-pong latency benchmark
//!
//! Two modes share one binary:
//! - `serve`: an echo server that writes back whatever it reads
//! - `bench`: a client that opens many connections, releases them together,
//!   runs a fixed number of round trips on each and prints one latency per
//!   connection
//!
//! Configuration via CLI arguments or TOML file.

mod bench;
mod client;
mod config;
mod server;

use config::{ClientSettings, Config, Mode, ServerSettings};
use server::EchoServer;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging; stdout is reserved for results
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match config.mode {
        Mode::Serve(settings) => run_server(settings),
        Mode::Bench(settings) => run_client(settings),
    }
}

/// Run the echo server on a runtime sized by the thread hint
fn run_server(settings: ServerSettings) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        listen = %settings.listen,
        threads = ?settings.threads,
        max_connections = settings.max_connections,
        backlog = settings.backlog,
        "Starting echo server"
    );

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if let Some(threads) = settings.threads {
        builder.worker_threads(threads.max(1));
    }
    let runtime = builder.enable_all().build()?;

    runtime.block_on(async {
        let server = EchoServer::bind(&settings)?;
        server.run().await
    })?;
    Ok(())
}

/// Run the staged benchmark client
fn run_client(settings: ClientSettings) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        addr = %settings.addr,
        connections = settings.connections,
        round_trips = settings.round_trips,
        output = ?settings.output,
        "Starting benchmark client"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(client::run(settings))
}
