//! Card corpus loading.
//!
//! The corpus is a JSON array of objects. `id`, `name` and `apply_url` are
//! required; every other field becomes a descriptive attribute.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};

use super::types::{AttributeValue, CardAttributes, CreditCard};
use crate::core::errors::StoreError;

#[derive(Debug, Deserialize)]
struct RawCard {
    #[serde(alias = "card_id")]
    id: Option<Value>,
    #[serde(alias = "card_name", alias = "credit_card_name")]
    name: Option<String>,
    #[serde(alias = "url", alias = "apply_link")]
    apply_url: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Immutable list of cards, shared by every request.
#[derive(Debug, Clone, Default)]
pub struct CardCorpus {
    cards: Vec<Arc<CreditCard>>,
}

impl CardCorpus {
    /// Ids and names must both be unique: recommendations refer to cards by name.
    pub fn new(cards: Vec<CreditCard>) -> Result<Self, StoreError> {
        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for card in &cards {
            if !ids.insert(card.id.as_str()) {
                return Err(StoreError::InvalidCard(format!(
                    "duplicate card id '{}'",
                    card.id
                )));
            }
            if !names.insert(card.name.as_str()) {
                return Err(StoreError::InvalidCard(format!(
                    "duplicate card name '{}' (card '{}')",
                    card.name, card.id
                )));
            }
        }
        Ok(Self {
            cards: cards.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let contents = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let corpus = Self::from_json(&contents).map_err(|err| match err {
            StoreError::Parse { source, .. } => StoreError::Parse {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })?;
        tracing::info!("Loaded {} cards from {}", corpus.len(), path.display());
        Ok(corpus)
    }

    pub fn from_json(contents: &str) -> Result<Self, StoreError> {
        let raw: Vec<RawCard> =
            serde_json::from_str(contents).map_err(|source| StoreError::Parse {
                path: "<inline>".to_string(),
                source,
            })?;

        let cards = raw
            .into_iter()
            .enumerate()
            .map(|(index, raw)| convert_card(index, raw))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(cards)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<CreditCard>> {
        self.cards.iter().find(|card| card.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<CreditCard>> {
        self.cards.iter()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

fn convert_card(index: usize, raw: RawCard) -> Result<CreditCard, StoreError> {
    let id = match raw.id {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(StoreError::InvalidCard(format!(
                "card #{} has no id",
                index
            )))
        }
    };
    let name = required_text(raw.name, &id, "name")?;
    let apply_url = required_text(raw.apply_url, &id, "apply_url")?;

    let mut attributes = CardAttributes::new();
    for (key, value) in raw.extra {
        let value = match value {
            Value::String(s) => AttributeValue::Text(s),
            Value::Number(n) => AttributeValue::Number(n),
            Value::Null => continue,
            other => {
                return Err(StoreError::InvalidCard(format!(
                    "card '{}' attribute '{}' must be a string or number, got {}",
                    id, key, other
                )))
            }
        };
        attributes.insert(key, value);
    }

    Ok(CreditCard {
        id,
        name,
        apply_url,
        attributes,
    })
}

fn required_text(value: Option<String>, id: &str, field: &str) -> Result<String, StoreError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| StoreError::InvalidCard(format!("card '{}' has no {}", id, field)))
}
