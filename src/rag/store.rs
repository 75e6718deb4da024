//! Embeddings store: one precomputed vector per card.
//!
//! Generated offline by the `generate-embeddings` binary and loaded once per
//! process. The persisted form only carries card ids; loading joins them back to
//! the corpus so each entry holds a shared reference to its card.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cards::{CardCorpus, CreditCard};
use crate::core::errors::StoreError;

#[derive(Debug, Clone)]
pub struct CardEmbedding {
    pub card_id: String,
    pub card: Arc<CreditCard>,
    pub vector: Vec<f32>,
}

impl CardEmbedding {
    pub fn new(card: Arc<CreditCard>, vector: Vec<f32>) -> Self {
        Self {
            card_id: card.id.clone(),
            card,
            vector,
        }
    }
}

/// On-disk representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedStore {
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dimensions: Option<usize>,
    pub entries: Vec<PersistedEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedEntry {
    pub card_id: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct EmbeddingsStore {
    generated_at: DateTime<Utc>,
    model: Option<String>,
    entries: Vec<CardEmbedding>,
}

impl EmbeddingsStore {
    /// Builds a store, enforcing that every vector is non-empty, finite and of one
    /// length.
    pub fn new(
        entries: Vec<CardEmbedding>,
        generated_at: DateTime<Utc>,
        model: Option<String>,
    ) -> Result<Self, StoreError> {
        let mut dimensions: Option<usize> = None;
        for entry in &entries {
            if entry.vector.is_empty() {
                return Err(StoreError::InvalidStore(format!(
                    "card '{}' has an empty embedding",
                    entry.card_id
                )));
            }
            if entry.vector.iter().any(|value| !value.is_finite()) {
                return Err(StoreError::InvalidStore(format!(
                    "card '{}' has a non-finite embedding component",
                    entry.card_id
                )));
            }
            match dimensions {
                None => dimensions = Some(entry.vector.len()),
                Some(expected) if expected != entry.vector.len() => {
                    return Err(StoreError::InvalidStore(format!(
                        "card '{}' has {} dimensions, expected {}",
                        entry.card_id,
                        entry.vector.len(),
                        expected
                    )));
                }
                Some(_) => {}
            }
        }

        Ok(Self {
            generated_at,
            model,
            entries,
        })
    }

    pub fn load(path: &Path, corpus: &CardCorpus) -> Result<Self, StoreError> {
        let contents = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let persisted: PersistedStore =
            serde_json::from_str(&contents).map_err(|source| StoreError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        let store = Self::from_persisted(persisted, corpus)?;
        tracing::info!(
            "Loaded {} card embeddings ({} dims, generated {}) from {}",
            store.len(),
            store.dimensions().unwrap_or(0),
            store.generated_at.to_rfc3339(),
            path.display()
        );
        Ok(store)
    }

    pub fn from_persisted(persisted: PersistedStore, corpus: &CardCorpus) -> Result<Self, StoreError> {
        let mut entries = Vec::with_capacity(persisted.entries.len());
        for entry in persisted.entries {
            let Some(card) = corpus.get(&entry.card_id) else {
                tracing::warn!(
                    "Skipping embedding for unknown card '{}' (store is older than the corpus?)",
                    entry.card_id
                );
                continue;
            };
            entries.push(CardEmbedding::new(card.clone(), entry.embedding));
        }

        let store = Self::new(entries, persisted.generated_at, persisted.model)?;
        if let (Some(declared), Some(actual)) = (persisted.dimensions, store.dimensions()) {
            if declared != actual {
                return Err(StoreError::InvalidStore(format!(
                    "store declares {} dimensions but vectors have {}",
                    declared, actual
                )));
            }
        }
        Ok(store)
    }

    pub fn to_persisted(&self) -> PersistedStore {
        PersistedStore {
            generated_at: self.generated_at,
            model: self.model.clone(),
            dimensions: self.dimensions(),
            entries: self
                .entries
                .iter()
                .map(|entry| PersistedEntry {
                    card_id: entry.card_id.clone(),
                    embedding: entry.vector.clone(),
                })
                .collect(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string(&self.to_persisted()).map_err(|source| {
            StoreError::Parse {
                path: path.display().to_string(),
                source,
            }
        })?;
        fs::write(path, json).map_err(io_err)
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Shared vector length, `None` for an empty store.
    pub fn dimensions(&self) -> Option<usize> {
        self.entries.first().map(|entry| entry.vector.len())
    }

    pub fn entries(&self) -> &[CardEmbedding] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
