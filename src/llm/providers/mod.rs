pub mod ollama;
pub mod remote;

use reqwest::Response;
use tracing::error;

use super::LlmError;

/// Turns a non-2xx completion response into a [`LlmError::ResponseError`],
/// keeping the body in the log but out of the user-facing message.
pub(crate) async fn status_error(backend: &str, response: Response) -> LlmError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    error!("{} completion failed with {}: {}", backend, status, body);
    LlmError::ResponseError(format!("{} responded with status code: {}", backend, status))
}
