//! Language-model collaborator
//!
//! A narrow chat-completion interface used for conversational replies and
//! content generation. Any `OpenAI`-compatible endpoint works, including a
//! local Ollama server.

mod error;
mod openai;
mod types;

pub use error::{LlmError, LlmErrorKind};
pub use openai::OpenAiCompatService;
pub use types::*;

use crate::config::LlmSettings;
use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for LLM providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Make a completion request
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Build the configured service, wrapped for logging.
///
/// Returns `None` when the model is disabled; callers then fall back to
/// canned replies.
pub fn service_from_settings(settings: &LlmSettings) -> Result<Option<Arc<dyn LlmService>>, LlmError> {
    if settings.disabled {
        return Ok(None);
    }
    let inner: Arc<dyn LlmService> = Arc::new(OpenAiCompatService::new(
        &settings.base_url,
        settings.api_key.clone(),
        &settings.model,
        settings.request_timeout,
    )?);
    Ok(Some(Arc::new(LoggingService::new(inner))))
}

/// Decorator that records model, latency and outcome of every call
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => tracing::info!(
                model = %self.model_id,
                duration_ms = %duration.as_millis(),
                messages = request.messages.len(),
                input_tokens = response.usage.input_tokens,
                output_tokens = response.usage.output_tokens,
                "LLM request completed"
            ),
            // Transient failures are expected; callers fall back
            Err(e) if e.kind.is_retryable() => tracing::warn!(
                model = %self.model_id,
                duration_ms = %duration.as_millis(),
                kind = ?e.kind,
                error = %e.message,
                "LLM request failed"
            ),
            Err(e) => tracing::error!(
                model = %self.model_id,
                duration_ms = %duration.as_millis(),
                kind = ?e.kind,
                error = %e.message,
                "LLM request failed"
            ),
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
