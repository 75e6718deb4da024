use std::sync::Arc;

use crate::core::errors::{AdvisorError, ExternalService};
use crate::llm::EmbeddingProvider;

/// Turns a user question into a vector comparable with the store.
#[derive(Clone)]
pub struct QueryEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    model_id: String,
    dimensions: Option<usize>,
}

impl QueryEmbedder {
    /// `dimensions` is the store's vector length; `None` skips the check.
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        model_id: impl Into<String>,
        dimensions: Option<usize>,
    ) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
            dimensions,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>, AdvisorError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AdvisorError::InvalidRequest(
                "query text must not be empty".to_string(),
            ));
        }

        let mut vectors = self
            .provider
            .embed(&[query.to_string()], &self.model_id)
            .await?;
        if vectors.len() != 1 {
            return Err(AdvisorError::external(
                ExternalService::Embedding,
                format!("expected 1 embedding, got {}", vectors.len()),
            ));
        }
        let vector = vectors.remove(0);

        if vector.is_empty() {
            return Err(AdvisorError::external(
                ExternalService::Embedding,
                "provider returned an empty embedding",
            ));
        }
        if vector.iter().any(|value| !value.is_finite()) {
            return Err(AdvisorError::external(
                ExternalService::Embedding,
                "provider returned a non-finite embedding component",
            ));
        }
        if let Some(expected) = self.dimensions {
            if vector.len() != expected {
                return Err(AdvisorError::external_with_details(
                    ExternalService::Embedding,
                    format!(
                        "embedding has {} dimensions, store has {}",
                        vector.len(),
                        expected
                    ),
                    format!(
                        "model '{}' does not match the model the store was generated with",
                        self.model_id
                    ),
                ));
            }
        }

        tracing::debug!("Embedded query ({} dims)", vector.len());
        Ok(vector)
    }
}
