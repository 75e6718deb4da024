//! Retrieval half of the pipeline.
//!
//! - `QueryEmbedder`: question text to vector
//! - `EmbeddingsStore`: precomputed card vectors, loaded once
//! - `Retriever`: ranks store entries against a query vector
//! - `context_builder`: renders the selected cards for the prompt
//! - `indexer`: builds the store offline

pub mod context_builder;
pub mod indexer;
pub mod query_embedder;
pub mod retriever;
pub mod store;
pub mod vector_math;

pub use context_builder::CandidateContext;
pub use query_embedder::QueryEmbedder;
pub use retriever::{LinearRetriever, Retriever, ScoredCard};
pub use store::{CardEmbedding, EmbeddingsStore, PersistedEntry, PersistedStore};
