use crate::config::LlmConfig;
use crate::db::models::SchemaInfo;
use crate::llm::models::ChatMessage;
use crate::llm::prompt::{chat_messages, finish_sql};
use crate::llm::providers::status_error;
use crate::llm::{LlmError, SqlGenerator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_API_URL: &str = "http://localhost:11434/api/chat";

/// Local models served by Ollama's chat endpoint.
pub struct OllamaProvider {
    client: reqwest::Client,
    api_url: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: usize,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
    #[serde(default)]
    done_reason: Option<String>,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_url = config.api_url.as_deref().unwrap_or(DEFAULT_API_URL).to_string();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl SqlGenerator for OllamaProvider {
    async fn generate_sql(&self, question: &str, schema: &SchemaInfo) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.model,
            messages: chat_messages(schema, question),
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };
        info!("Requesting SQL from Ollama at {} with model {}", self.api_url, self.model);

        let response = self
            .client
            .post(&self.api_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(status_error("Ollama", response).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| LlmError::ResponseError(e.to_string()))?;
        debug!("Ollama reply: {}", body);

        let reply: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::ResponseError(format!("unexpected Ollama reply: {}", e)))?;
        if let Some(reason) = reply.done_reason.as_deref().filter(|r| *r != "stop") {
            debug!("Ollama stopped early: {}", reason);
        }

        finish_sql(&reply.message.content)
    }
}
