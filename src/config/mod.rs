//! Configuration Module
//!
//! Provides TOML-based configuration for AgentBridge with support for:
//! - Agent endpoint settings (base URL, bearer token, request timeout)
//! - Kafka connection settings (brokers, group, security)
//! - Bridge settings (poll timeout, retry policy)
//! - Ordered route definitions, inline or from a JSON routes file
//! - Environment variable overrides (AGENTBRIDGE__* prefix)

use std::path::Path;
use std::time::Duration;

use config::{Environment, File, FileFormat};
use regex::Regex;
use serde::Deserialize;

// Re-export route config types
pub use route::{RouteConfig, TOPIC_WILDCARD};

mod route;


/// Substitute environment variables in a string.
/// Supports `${VAR}` and `${VAR:-default}` syntax.
fn substitute_env_vars(content: &str) -> String {
    let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").unwrap();
    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var_name).unwrap_or_else(|_| default.to_string())
    })
    .to_string()
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
    /// Config crate error
    Config(config::ConfigError),
    /// Routes file parsing error
    Routes(serde_json::Error),
    /// Validation error
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Config(e) => write!(f, "Config error: {}", e),
            ConfigError::Routes(e) => write!(f, "Routes file error: {}", e),
            ConfigError::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(e: config::ConfigError) -> Self {
        ConfigError::Config(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Routes(e)
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,
    /// Agent endpoint configuration
    pub agent: AgentConfig,
    /// Kafka connection configuration
    pub kafka: KafkaConfig,
    /// Bridge loop and retry settings
    pub bridge: BridgeConfig,
    /// Ordered route definitions; declaration order is matching order
    #[serde(default, alias = "routes")]
    pub route: Vec<RouteConfig>,
    /// Optional JSON file holding the route table (deployment format);
    /// used when no inline routes are configured
    pub routes_file: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level: error, warn, info, debug, trace
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Agent endpoint configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base URL of the agent endpoint
    #[serde(default = "default_agent_url")]
    pub url: String,
    /// Bearer token for every delivery call; required, never defaulted
    #[serde(default)]
    pub token: String,
    /// Per-request timeout
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,
}

fn default_agent_url() -> String {
    "http://localhost:9000".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            url: default_agent_url(),
            token: String::new(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Kafka connection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    /// Broker bootstrap list
    #[serde(default = "default_bootstrap_servers")]
    pub bootstrap_servers: String,
    /// Consumer group identity
    #[serde(default = "default_group_id")]
    pub group_id: String,
    /// Explicit topic subscriptions; when empty, topics derive from the
    /// route patterns with wildcard markers stripped
    #[serde(default)]
    pub topics: Vec<String>,
    /// Optional security protocol (e.g. SASL_SSL)
    pub security_protocol: Option<String>,
    /// Optional SASL mechanism
    pub sasl_mechanism: Option<String>,
    /// Optional SASL username
    pub sasl_username: Option<String>,
    /// Optional SASL password
    pub sasl_password: Option<String>,
}

fn default_bootstrap_servers() -> String {
    "localhost:9092".to_string()
}

fn default_group_id() -> String {
    "agentbridge".to_string()
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: default_bootstrap_servers(),
            group_id: default_group_id(),
            topics: Vec::new(),
            security_protocol: None,
            sasl_mechanism: None,
            sasl_username: None,
            sasl_password: None,
        }
    }
}

/// Bridge loop and retry settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Inbound poll timeout
    #[serde(with = "humantime_serde", default = "default_poll_timeout")]
    pub poll_timeout: Duration,
    /// Maximum delivery attempts per message
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Fixed pause between delivery attempts
    #[serde(with = "humantime_serde", default = "default_retry_delay")]
    pub retry_delay: Duration,
}

fn default_poll_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(1)
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poll_timeout: default_poll_timeout(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file with environment variable
    /// overrides.
    ///
    /// Supports two forms of environment variable usage:
    /// 1. In-file substitution: `${VAR}` or `${VAR:-default}` syntax
    /// 2. Override via env vars: `AGENTBRIDGE__` prefix with double
    ///    underscores for nesting:
    ///    - `AGENTBRIDGE__AGENT__TOKEN=...` overrides `agent.token`
    ///    - `AGENTBRIDGE__KAFKA__GROUP_ID=...` overrides `kafka.group_id`
    ///    - `AGENTBRIDGE__BRIDGE__MAX_RETRIES=5` overrides `bridge.max_retries`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            // Start with defaults
            .set_default("log.level", "info")?
            .set_default("agent.url", "http://localhost:9000")?
            .set_default("agent.request_timeout", "60s")?
            .set_default("kafka.bootstrap_servers", "localhost:9092")?
            .set_default("kafka.group_id", "agentbridge")?
            .set_default("bridge.poll_timeout", "1s")?
            .set_default("bridge.max_retries", 3)?
            .set_default("bridge.retry_delay", "1s")?;

        // Load from file with env var substitution
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let substituted = substitute_env_vars(&content);
                builder = builder.add_source(File::from_str(&substituted, FileFormat::Toml));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File doesn't exist, use defaults
            }
            Err(e) => return Err(ConfigError::Io(e)),
        }

        // Override with environment variables (AGENTBRIDGE__AGENT__TOKEN, etc.)
        // Double underscore separates nested keys, single underscore
        // preserved in field names
        let cfg = builder
            .add_source(
                Environment::with_prefix("AGENTBRIDGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Config = cfg.try_deserialize()?;
        config.finalize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides only
    /// (no file). Useful for containerized deployments.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Path::new(""))
    }

    /// Parse configuration from a string (for testing, no env var support)
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(content)?;
        config.finalize()?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the route table: fall back to the routes file, then to the
    /// built-in default set, and name any unnamed routes by position.
    fn finalize(&mut self) -> Result<(), ConfigError> {
        if self.route.is_empty() {
            if let Some(ref path) = self.routes_file {
                self.route = load_routes_file(path)?;
            }
        }
        if self.route.is_empty() {
            self.route = default_routes();
        }

        for (i, route) in self.route.iter_mut().enumerate() {
            if route.name.is_empty() {
                route.name = format!("route-{}", i);
            }
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.token.is_empty() {
            return Err(ConfigError::Validation(
                "agent.token is required (set AGENTBRIDGE__AGENT__TOKEN)".to_string(),
            ));
        }

        if self.route.is_empty() {
            return Err(ConfigError::Validation(
                "at least one route must be configured".to_string(),
            ));
        }

        for route in &self.route {
            if route.topic_pattern.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "route '{}' has an empty topic_pattern",
                    route.name
                )));
            }
        }

        Ok(())
    }

    /// Topics to subscribe to: the explicit override when set, otherwise
    /// derived from the route patterns.
    pub fn subscribe_topics(&self) -> Vec<String> {
        if !self.kafka.topics.is_empty() {
            return self.kafka.topics.clone();
        }

        let mut topics: Vec<String> = Vec::new();
        for route in &self.route {
            let topic = route.subscribe_topic();
            if !topic.is_empty() && !topics.contains(&topic) {
                topics.push(topic);
            }
        }

        if topics.is_empty() {
            topics.push("agent.events".to_string());
        }
        topics
    }
}

/// Load a route table from a JSON file (the deployment format: a JSON
/// array of route objects).
fn load_routes_file(path: &str) -> Result<Vec<RouteConfig>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let routes: Vec<RouteConfig> = serde_json::from_str(&content)?;
    Ok(routes)
}

/// Built-in example route set, used when nothing else is configured.
/// Destination ids come from the environment so the defaults are usable
/// in container deployments without a config file.
fn default_routes() -> Vec<RouteConfig> {
    vec![
        RouteConfig {
            name: "customer-support".to_string(),
            topic_pattern: "customer.events".to_string(),
            destination_id: std::env::var("CUSTOMER_SUPPORT_DESTINATION_ID").unwrap_or_default(),
            header_match: Some(
                [("event_type".to_string(), "support_request".to_string())]
                    .into_iter()
                    .collect(),
            ),
            ..Default::default()
        },
        RouteConfig {
            name: "order-processing".to_string(),
            topic_pattern: "orders.events".to_string(),
            destination_id: std::env::var("ORDER_PROCESSING_DESTINATION_ID").unwrap_or_default(),
            ..Default::default()
        },
        RouteConfig {
            name: "analytics-insights".to_string(),
            topic_pattern: "analytics.*".to_string(),
            destination_id: std::env::var("ANALYTICS_DESTINATION_ID").unwrap_or_default(),
            ..Default::default()
        },
    ]
}
