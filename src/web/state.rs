use chrono::{DateTime, Utc};
use minijinja::Environment;

use crate::config::AppConfig;
use crate::llm::{LlmError, LlmManager};
use crate::market::yahoo::YahooClient;
use crate::web::session::SessionStore;

/// Shared application state for the web server
pub struct AppState {
    pub config: AppConfig,
    pub template_env: Environment<'static>,
    /// An unusable LLM setup is not fatal: connection tests and the stocks
    /// page keep working, query actions show the reason instead.
    pub llm: Result<LlmManager, LlmError>,
    pub market: YahooClient,
    pub sessions: SessionStore,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        template_env: Environment<'static>,
        llm: Result<LlmManager, LlmError>,
        market: YahooClient,
    ) -> Self {
        Self {
            config,
            template_env,
            llm,
            market,
            sessions: SessionStore::default(),
            startup_time: Utc::now(),
        }
    }
}
