use thiserror::Error;

use crate::core::errors::{AdvisorError, StoreError};

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[source] AdvisorError),

    #[error("Failed to load card corpus: {0}")]
    Corpus(#[source] StoreError),

    #[error("Failed to load embeddings store: {0}")]
    Embeddings(#[source] StoreError),

    #[error("Failed to initialize model provider: {0}")]
    Provider(#[source] AdvisorError),
}
