use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

mod config;
mod db;
mod llm;
mod market;
mod mcp;
mod util;
mod web;

use crate::config::{AppConfig, CliArgs};
use crate::llm::LlmManager;
use crate::market::yahoo::YahooClient;
use crate::util::logging::init_tracing;
use crate::web::state::AppState;
use crate::web::templates::init_templates;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine; the key may come from the real environment
    let dotenv = dotenvy::dotenv();

    // Initialize logging
    init_tracing();
    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Initialize LLM manager; without it only connection tests and stocks work
    info!("Initializing LLM manager with backend: {}", config.llm.backend);
    let llm_manager = LlmManager::new(&config.llm);
    if let Err(e) = &llm_manager {
        warn!("LLM unavailable, query actions are disabled: {}", e);
    }

    let market = YahooClient::new(&config.market)?;
    let templates = init_templates()?;

    info!(
        "Tool server: {} {}",
        config.tool_server.command,
        config.tool_server.args.join(" ")
    );

    let web_config = config.web.clone();
    let app_state = Arc::new(AppState::new(config, templates, llm_manager, market));

    // Start the web server
    info!("Starting pg-nl-query on {}:{}", web_config.host, web_config.port);
    match web::run_server(&web_config, app_state).await {
        Ok(()) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
