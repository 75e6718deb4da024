use async_trait::async_trait;

use super::types::ChatRequest;
use crate::core::errors::AdvisorError;

/// Text → vector service.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// return the provider name (e.g. "openai")
    fn name(&self) -> &str;

    /// one vector per input, in input order
    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, AdvisorError>;
}

/// Chat-completion service.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &str;

    /// chat completion (non-streaming); returns the assistant text unmodified
    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, AdvisorError>;
}
