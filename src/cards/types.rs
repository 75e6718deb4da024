use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A descriptive attribute value. Numbers keep their original integer or float
/// form so they render back exactly as they were loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Number(n) => write!(f, "{}", n),
            AttributeValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Number(value.into())
    }
}

pub type CardAttributes = BTreeMap<String, AttributeValue>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreditCard {
    pub id: String,
    pub name: String,
    pub apply_url: String,
    #[serde(flatten)]
    pub attributes: CardAttributes,
}

impl CreditCard {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        apply_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            apply_url: apply_url.into(),
            attributes: CardAttributes::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Compact JSON object of the descriptive attributes.
    pub fn attributes_json(&self) -> String {
        serde_json::to_string(&self.attributes).unwrap_or_else(|_| "{}".to_string())
    }

    /// Text the offline generator embeds for this card.
    pub fn description_text(&self) -> String {
        let mut text = self.name.clone();
        for (key, value) in &self.attributes {
            text.push_str(&format!(". {}: {}", key.replace('_', " "), value));
        }
        text
    }
}
