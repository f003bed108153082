//! Configuration module for echo-bench.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "echo-bench")]
#[command(author = "echo-bench authors")]
#[command(version = "0.1.0")]
#[command(about = "TCP ping-pong latency benchmark and echo server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the echo server
    Serve(ServeArgs),
    /// Run the benchmark client against an echo server
    Bench(BenchArgs),
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Address to bind to (e.g., 0.0.0.0:8080)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Number of runtime worker threads (defaults to number of CPU cores)
    #[arg(short = 'n', long)]
    pub threads: Option<usize>,

    /// Maximum number of concurrent connections
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Listen backlog
    #[arg(long)]
    pub backlog: Option<u32>,
}

#[derive(Args, Debug, Default)]
pub struct BenchArgs {
    /// Server address (host:port)
    #[arg(short = 'a', long)]
    pub addr: Option<String>,

    /// Number of concurrent connections
    #[arg(short = 'n', long)]
    pub connections: Option<usize>,

    /// Number of round trips per connection
    #[arg(short = 'm', long)]
    pub messages: Option<usize>,

    /// Output file (defaults to stdout)
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Skip the confirmation prompts
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Number of runtime worker threads
    pub threads: Option<usize>,
    /// Maximum number of concurrent connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Listen backlog
    #[serde(default = "default_backlog")]
    pub backlog: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            threads: None,
            max_connections: default_max_connections(),
            backlog: default_backlog(),
        }
    }
}

/// Client-related configuration
#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    /// Server address
    #[serde(default = "default_addr")]
    pub addr: String,
    /// Number of concurrent connections
    #[serde(default = "default_connections")]
    pub connections: usize,
    /// Round trips per connection
    #[serde(default = "default_round_trips")]
    pub round_trips: usize,
    /// Output file
    pub output: Option<PathBuf>,
    /// Pause for confirmation between phases
    #[serde(default = "default_interactive")]
    pub interactive: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            connections: default_connections(),
            round_trips: default_round_trips(),
            output: None,
            interactive: default_interactive(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level
    pub level: Option<String>,
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_max_connections() -> usize {
    10000
}

fn default_backlog() -> u32 {
    1024
}

fn default_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_connections() -> usize {
    10
}

fn default_round_trips() -> usize {
    10
}

fn default_interactive() -> bool {
    true
}

/// Resolved echo server settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub listen: SocketAddr,
    pub threads: Option<usize>,
    pub max_connections: usize,
    pub backlog: u32,
}

/// Resolved benchmark client settings.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub addr: String,
    pub connections: usize,
    pub round_trips: usize,
    pub output: Option<PathBuf>,
    pub interactive: bool,
}

/// What to run.
#[derive(Debug, Clone)]
pub enum Mode {
    Serve(ServerSettings),
    Bench(ClientSettings),
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub mode: Mode,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::merge(cli, toml_config)
    }

    /// Merge CLI args with TOML config (CLI takes precedence)
    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let file_level = toml_config.logging.level;

        let (mode, default_level) = match cli.command {
            Command::Serve(args) => {
                let server = toml_config.server;
                let listen = args.listen.unwrap_or(server.listen);
                let listen = listen
                    .parse::<SocketAddr>()
                    .map_err(|e| ConfigError::InvalidAddress(listen.clone(), e))?;

                let settings = ServerSettings {
                    listen,
                    threads: args.threads.or(server.threads),
                    max_connections: args.max_connections.unwrap_or(server.max_connections),
                    backlog: args.backlog.unwrap_or(server.backlog),
                };
                (Mode::Serve(settings), "debug")
            }
            Command::Bench(args) => {
                let client = toml_config.client;
                let settings = ClientSettings {
                    addr: args.addr.unwrap_or(client.addr),
                    connections: args.connections.unwrap_or(client.connections),
                    round_trips: args.messages.unwrap_or(client.round_trips),
                    output: args.output.or(client.output),
                    interactive: !args.yes && client.interactive,
                };
                (Mode::Bench(settings), "info")
            }
        };

        Ok(Config {
            log_level: cli
                .log_level
                .or(file_level)
                .unwrap_or_else(|| default_level.to_string()),
            mode,
        })
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    InvalidAddress(String, AddrParseError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidAddress(addr, e) => {
                write!(f, "Invalid listen address '{}': {}", addr, e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
