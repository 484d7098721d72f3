//! AgentBridge - Kafka to agent-endpoint routing bridge
//!
//! Usage:
//!   agentbridge [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>    Configuration file path
//!   --agent-url <URL>      Agent endpoint base URL
//!   --brokers <LIST>       Kafka bootstrap servers
//!   --group-id <ID>        Kafka consumer group
//!   -l, --log-level        Log level (error, warn, info, debug, trace)
//!   -h, --help             Print help

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use agentbridge::bridge::Bridge;
use agentbridge::config::Config;
use agentbridge::delivery::AgentClient;
use agentbridge::source::KafkaSource;

/// Log level for CLI
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum LogLevel {
    /// Only errors
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages
    #[default]
    Info,
    /// Debug messages
    Debug,
    /// Trace messages (very verbose)
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

/// AgentBridge - Kafka to agent-endpoint routing bridge
#[derive(Parser, Debug)]
#[command(name = "agentbridge")]
#[command(author = "AgentBridge Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Routes Kafka messages to downstream agent endpoints")]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Agent endpoint base URL
    #[arg(long)]
    agent_url: Option<String>,

    /// Kafka bootstrap servers
    #[arg(long)]
    brokers: Option<String>,

    /// Kafka consumer group id
    #[arg(long)]
    group_id: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration file if specified, otherwise env/defaults only.
    // A missing token or empty route table is fatal here, before the
    // loop ever starts.
    let load_result = match &args.config {
        Some(path) => Config::load(path),
        None => Config::from_env(),
    };
    let mut file_config = match load_result {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    };

    // CLI args override file config
    if let Some(url) = args.agent_url {
        file_config.agent.url = url;
    }
    if let Some(brokers) = args.brokers {
        file_config.kafka.bootstrap_servers = brokers;
    }
    if let Some(group_id) = args.group_id {
        file_config.kafka.group_id = group_id;
    }

    // Setup logging - CLI overrides config, config overrides default (info)
    let log_level = args.log_level.unwrap_or_else(|| {
        match file_config.log.level.to_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" => LogLevel::Warn,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => LogLevel::Info,
        }
    });

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level.to_tracing_level())
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if let Some(path) = &args.config {
        info!("Loaded configuration from {:?}", path);
    }

    let topics = file_config.subscribe_topics();

    info!("Starting AgentBridge");
    info!("  Agent URL: {}", file_config.agent.url);
    info!("  Kafka servers: {}", file_config.kafka.bootstrap_servers);
    info!("  Consumer group: {}", file_config.kafka.group_id);
    info!("  Topics: {:?}", topics);
    info!("  Routes configured: {}", file_config.route.len());
    for route in &file_config.route {
        let destination = if route.destination_id.is_empty() {
            "(not configured)"
        } else {
            route.destination_id.as_str()
        };
        info!(
            "    - {}: {} -> {}",
            route.name, route.topic_pattern, destination
        );
    }
    info!(
        "  Retry policy: {} attempt(s), {:?} delay",
        file_config.bridge.max_retries, file_config.bridge.retry_delay
    );

    let client = match AgentClient::new(
        &file_config.agent.url,
        &file_config.agent.token,
        file_config.agent.request_timeout,
    ) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("Error creating agent client: {}", e);
            std::process::exit(1);
        }
    };

    let source = match KafkaSource::connect(&file_config.kafka, &topics) {
        Ok(source) => Box::new(source),
        Err(e) => {
            eprintln!("Error connecting to Kafka: {}", e);
            std::process::exit(1);
        }
    };

    let (mut bridge, stop_handle) = Bridge::new(&file_config, source, client);

    // Cooperative shutdown on Ctrl+C; the stop takes effect at the top
    // of the loop, never mid-delivery.
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, stopping bridge...");
            stop_handle.stop();
        }
    });

    if let Err(e) = bridge.run().await {
        error!("Bridge failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
