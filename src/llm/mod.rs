pub mod models;
pub mod prompt;
pub mod providers;

use crate::config::LlmConfig;
use crate::db::models::SchemaInfo;
use async_trait::async_trait;
use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum LlmError {
    ConnectionError(String),
    ResponseError(String),
    ConfigError(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::ConnectionError(msg) => write!(f, "LLM connection error: {}", msg),
            LlmError::ResponseError(msg) => write!(f, "LLM response error: {}", msg),
            LlmError::ConfigError(msg) => write!(f, "LLM configuration error: {}", msg),
        }
    }
}

impl Error for LlmError {}

/// Turns a question into a single SQL statement, fences already stripped.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    async fn generate_sql(&self, question: &str, schema: &SchemaInfo) -> Result<String, LlmError>;
}

pub struct LlmManager {
    generator: Box<dyn SqlGenerator + Send + Sync>,
}

impl LlmManager {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let generator: Box<dyn SqlGenerator + Send + Sync> = match config.backend.as_str() {
            "remote" => Box::new(providers::remote::RemoteLlmProvider::new(config)?),
            "ollama" => Box::new(providers::ollama::OllamaProvider::new(config)?),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Self { generator })
    }

    pub async fn generate_sql(&self, question: &str, schema: &SchemaInfo) -> Result<String, LlmError> {
        self.generator.generate_sql(question, schema).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn unknown_backend_is_rejected() {
        let mut config = AppConfig::default().llm;
        config.backend = "local".to_string();
        let err = LlmManager::new(&config).err().unwrap();
        assert!(err.to_string().contains("Unsupported LLM backend: local"));
    }

    #[test]
    fn remote_backend_requires_a_key() {
        let config = AppConfig::default().llm;
        assert!(matches!(LlmManager::new(&config), Err(LlmError::ConfigError(_))));
    }

    #[test]
    fn ollama_needs_no_key() {
        let mut config = AppConfig::default().llm;
        config.backend = "ollama".to_string();
        assert!(LlmManager::new(&config).is_ok());
    }
}
