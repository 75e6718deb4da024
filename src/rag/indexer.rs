//! Offline construction of the embeddings store from the card corpus.

use chrono::Utc;

use super::store::{CardEmbedding, EmbeddingsStore};
use crate::cards::CardCorpus;
use crate::core::errors::{AdvisorError, ExternalService};
use crate::llm::EmbeddingProvider;

pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Embeds every card's description text, `batch_size` cards per request, in
/// corpus order.
pub async fn build_store(
    corpus: &CardCorpus,
    provider: &dyn EmbeddingProvider,
    model_id: &str,
    batch_size: usize,
) -> Result<EmbeddingsStore, AdvisorError> {
    let cards: Vec<_> = corpus.iter().cloned().collect();
    let mut entries = Vec::with_capacity(cards.len());

    for (batch_index, batch) in cards.chunks(batch_size.max(1)).enumerate() {
        let inputs: Vec<String> = batch.iter().map(|card| card.description_text()).collect();
        let vectors = provider.embed(&inputs, model_id).await?;
        if vectors.len() != batch.len() {
            return Err(AdvisorError::external(
                ExternalService::Embedding,
                format!(
                    "expected {} embeddings in batch {}, got {}",
                    batch.len(),
                    batch_index,
                    vectors.len()
                ),
            ));
        }
        tracing::info!(
            "Embedded batch {} ({} cards) with {}",
            batch_index + 1,
            batch.len(),
            provider.name()
        );
        entries.extend(
            batch
                .iter()
                .cloned()
                .zip(vectors)
                .map(|(card, vector)| CardEmbedding::new(card, vector)),
        );
    }

    EmbeddingsStore::new(entries, Utc::now(), Some(model_id.to_string())).map_err(|e| {
        AdvisorError::external_with_details(
            ExternalService::Embedding,
            "provider returned inconsistent embeddings",
            e.to_string(),
        )
    })
}
