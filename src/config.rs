use clap::Parser;
use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub backend: String, // "remote" or "ollama"
    pub model: String,   // Model name
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
}

/// How to launch the MCP tool server that talks to PostgreSQL.
#[derive(Debug, Deserialize, Clone)]
pub struct ToolServerConfig {
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: Option<String>,
    pub request_timeout_secs: u64,
    pub shutdown_grace_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarketConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub range: String,
    pub interval: String,
    pub default_ticker: String,
}

/// Values pre-filled into the connection form of a fresh session.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseDefaults {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub web: WebConfig,
    pub llm: LlmConfig,
    pub tool_server: ToolServerConfig,
    pub market: MarketConfig,
    pub database: DatabaseDefaults,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        // Start from the built-in defaults so a missing file still yields a usable config
        let mut config_builder = Config::builder()
            .set_default("web.host", "127.0.0.1")?
            .set_default("web.port", 8501)?
            .set_default("llm.backend", "remote")?
            .set_default("llm.model", "llama-3.3-70b-versatile")?
            .set_default("llm.temperature", 0.1)?
            .set_default("llm.max_tokens", 500)?
            .set_default("llm.timeout_secs", 60)?
            .set_default("tool_server.command", "node")?
            .set_default("tool_server.args", vec!["mcp-server/build/index.js"])?
            .set_default("tool_server.request_timeout_secs", 120)?
            .set_default("tool_server.shutdown_grace_secs", 2)?
            .set_default("market.base_url", "https://query1.finance.yahoo.com")?
            .set_default("market.timeout_secs", 30)?
            .set_default("market.range", "1y")?
            .set_default("market.interval", "1d")?
            .set_default("market.default_ticker", "7203.T")?
            .set_default("database.host", "localhost")?
            .set_default("database.port", 5432)?
            .set_default("database.database", "postgres")?
            .set_default("database.user", "postgres")?;

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/pg-nl-query/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        // Build the config
        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Override with command line args if provided
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }

        // The API key is normally supplied through the environment
        if config.llm.api_key.as_deref().is_none_or(str::is_empty) {
            config.llm.api_key = std::env::var("GROQ_API_KEY").ok().filter(|k| !k.is_empty());
        }

        Ok(config)
    }
}

// Default implementation
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            web: WebConfig {
                host: "127.0.0.1".to_string(),
                port: 8501,
            },
            llm: LlmConfig {
                backend: "remote".to_string(),
                model: "llama-3.3-70b-versatile".to_string(),
                api_key: None,
                api_url: None,
                temperature: 0.1,
                max_tokens: 500,
                timeout_secs: 60,
            },
            tool_server: ToolServerConfig {
                command: "node".to_string(),
                args: vec!["mcp-server/build/index.js".to_string()],
                working_dir: None,
                request_timeout_secs: 120,
                shutdown_grace_secs: 2,
            },
            market: MarketConfig {
                base_url: "https://query1.finance.yahoo.com".to_string(),
                timeout_secs: 30,
                range: "1y".to_string(),
                interval: "1d".to_string(),
                default_ticker: "7203.T".to_string(),
            },
            database: DatabaseDefaults {
                host: "localhost".to_string(),
                port: 5432,
                database: "postgres".to_string(),
                user: "postgres".to_string(),
            },
        }
    }
}
