use std::sync::Arc;

use super::store::EmbeddingsStore;
use super::vector_math::rank_descending_by_cosine;
use crate::cards::CreditCard;

/// A card selected for the current query, with its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredCard {
    pub card: Arc<CreditCard>,
    pub score: f32,
}

/// Ranks store entries against a query vector.
///
/// Implementations must return at most `k` entries ordered by non-increasing
/// score, with ties kept in store order.
pub trait Retriever: Send + Sync {
    fn name(&self) -> &str;

    fn retrieve(&self, query: &[f32], store: &EmbeddingsStore, k: usize) -> Vec<ScoredCard>;
}

/// Exhaustive O(N·D) cosine scan over the whole store.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearRetriever;

impl Retriever for LinearRetriever {
    fn name(&self) -> &str {
        "linear"
    }

    fn retrieve(&self, query: &[f32], store: &EmbeddingsStore, k: usize) -> Vec<ScoredCard> {
        let entries = store.entries();
        rank_descending_by_cosine(query, entries.iter().map(|entry| entry.vector.as_slice()))
            .into_iter()
            .take(k)
            .map(|(idx, score)| ScoredCard {
                card: entries[idx].card.clone(),
                score,
            })
            .collect()
    }
}
