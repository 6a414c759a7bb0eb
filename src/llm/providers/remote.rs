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

const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// OpenAI-compatible chat completions endpoint (Groq by default).
pub struct RemoteLlmProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct PromptRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Deserialize)]
struct PromptResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl RemoteLlmProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_url = config
            .api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let api_key = config.api_key.clone().filter(|k| !k.is_empty()).ok_or_else(|| {
            LlmError::ConfigError("GROQ_API_KEY is not set; an API key is required for the remote LLM provider".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl SqlGenerator for RemoteLlmProvider {
    async fn generate_sql(&self, question: &str, schema: &SchemaInfo) -> Result<String, LlmError> {
        let request = PromptRequest {
            model: self.model.clone(),
            messages: chat_messages(schema, question),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        info!("Requesting SQL from {} with model {}", self.api_url, self.model);
        debug!("Prompt: {}", request.messages[1].content);

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(status_error("LLM API", response).await);
        }

        let prompt_response: PromptResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseError(e.to_string()))?;

        let content = prompt_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ResponseError("No choices in response".to_string()))?
            .message
            .content
            .unwrap_or_default();

        debug!("Raw completion: {}", content);
        finish_sql(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::util::test_server;
    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured {
        body: Arc<Mutex<Option<Value>>>,
        auth: Arc<Mutex<Option<String>>>,
    }

    async fn completions(
        State(captured): State<Captured>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        *captured.auth.lock().unwrap() = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        *captured.body.lock().unwrap() = Some(body);
        Json(json!({
            "id": "chatcmpl-1",
            "choices": [
                { "index": 0, "message": { "role": "assistant", "content": "```sql\nSELECT name FROM users;\n```" } }
            ]
        }))
    }

    fn provider_for(base: &str) -> RemoteLlmProvider {
        let mut config = AppConfig::default().llm;
        config.api_key = Some("test-key".to_string());
        config.api_url = Some(format!("{}/v1/chat/completions", base));
        RemoteLlmProvider::new(&config).unwrap()
    }

    fn users_schema() -> SchemaInfo {
        serde_json::from_value(json!({ "tables": [{ "table_name": "users" }] })).unwrap()
    }

    #[tokio::test]
    async fn sends_two_messages_and_strips_the_reply() {
        let captured = Captured::default();
        let router = Router::new()
            .route("/v1/chat/completions", post(completions))
            .with_state(captured.clone());
        let base = test_server::spawn(router).await;

        let sql = provider_for(&base)
            .generate_sql("show all user names", &users_schema())
            .await
            .unwrap();
        assert_eq!(sql, "SELECT name FROM users;");
        for forbidden in ["INSERT", "UPDATE", "DELETE", "DROP"] {
            assert!(!sql.to_uppercase().contains(forbidden));
        }

        let body = captured.body.lock().unwrap().clone().unwrap();
        assert_eq!(body["model"], "llama-3.3-70b-versatile");
        assert_eq!(body["max_tokens"], 500);
        assert!((body["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(body["messages"][1]["content"].as_str().unwrap().contains("- users"));
        assert_eq!(captured.auth.lock().unwrap().as_deref(), Some("Bearer test-key"));
    }

    #[tokio::test]
    async fn empty_choices_is_a_response_error() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(json!({ "choices": [] })) }),
        );
        let base = test_server::spawn(router).await;

        let err = provider_for(&base)
            .generate_sql("anything", &users_schema())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::ResponseError(_)));
    }

    #[tokio::test]
    async fn http_failure_is_a_response_error() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (axum::http::StatusCode::UNAUTHORIZED, "bad key") }),
        );
        let base = test_server::spawn(router).await;

        let err = provider_for(&base)
            .generate_sql("anything", &users_schema())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let mut config = AppConfig::default().llm;
        config.api_key = Some(String::new());
        assert!(matches!(RemoteLlmProvider::new(&config), Err(LlmError::ConfigError(_))));
    }
}
