use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use super::prompt::{build_user_prompt, SYSTEM_PROMPT};
use super::types::Recommendation;
use crate::core::errors::AdvisorError;
use crate::llm::{ChatMessage, ChatProvider, ChatRequest};
use crate::rag::CandidateContext;

/// Validated generator output. Only this module can build one, so every
/// recommendation in it refers to a card of the candidate set it was checked
/// against.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    recommendations: Vec<Recommendation>,
    raw_answer: String,
}

impl GenerationOutcome {
    pub fn recommendations(&self) -> &[Recommendation] {
        &self.recommendations
    }

    /// The model's text, unmodified.
    pub fn raw_answer(&self) -> &str {
        &self.raw_answer
    }

    pub fn into_parts(self) -> (Vec<Recommendation>, String) {
        (self.recommendations, self.raw_answer)
    }
}

#[derive(Clone)]
pub struct RecommendationGenerator {
    provider: Arc<dyn ChatProvider>,
    model_id: String,
    temperature: f64,
    max_tokens: u32,
}

impl RecommendationGenerator {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        model_id: impl Into<String>,
        temperature: f64,
        max_tokens: u32,
    ) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
            temperature,
            max_tokens,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub async fn generate(
        &self,
        question: &str,
        candidates: &CandidateContext,
    ) -> Result<GenerationOutcome, AdvisorError> {
        let request = ChatRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_user_prompt(question, candidates.text())),
        ])
        .with_temperature(self.temperature)
        .with_max_tokens(self.max_tokens)
        .json_object();

        let raw_answer = self.provider.chat(request, &self.model_id).await?;
        Ok(validate_model_output(raw_answer, candidates))
    }
}

/// Parses the model's JSON and keeps only complete entries naming a candidate.
///
/// Never fails: unparseable output yields no recommendations and the raw text.
pub fn validate_model_output(raw_answer: String, candidates: &CandidateContext) -> GenerationOutcome {
    let parsed = match serde_json::from_str::<Value>(raw_answer.trim()) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!("Model output is not valid JSON: {}", err);
            return GenerationOutcome {
                recommendations: Vec::new(),
                raw_answer,
            };
        }
    };

    let Some(items) = parsed.get("cards").and_then(Value::as_array) else {
        tracing::warn!("Model output has no 'cards' array");
        return GenerationOutcome {
            recommendations: Vec::new(),
            raw_answer,
        };
    };

    let mut seen = HashSet::new();
    let mut recommendations = Vec::with_capacity(items.len());
    for item in items {
        let (Some(name), Some(url), Some(reason)) = (
            text_field(item, "credit_card_name"),
            text_field(item, "apply_url"),
            text_field(item, "reason"),
        ) else {
            tracing::debug!("Dropping incomplete recommendation: {}", item);
            continue;
        };

        let Some(card) = candidates.find_by_name(name) else {
            tracing::debug!("Dropping recommendation for non-candidate card '{}'", name);
            continue;
        };
        if !seen.insert(card.name.as_str()) {
            continue;
        }
        if url != card.apply_url {
            tracing::debug!(
                "Model gave '{}' for '{}'; using the listed apply url",
                url,
                card.name
            );
        }

        recommendations.push(Recommendation {
            credit_card_name: card.name.clone(),
            apply_url: card.apply_url.clone(),
            reason: reason.trim().to_string(),
        });
    }

    if recommendations.len() < items.len() {
        tracing::info!(
            "Kept {} of {} model recommendations",
            recommendations.len(),
            items.len()
        );
    }

    GenerationOutcome {
        recommendations,
        raw_answer,
    }
}

fn text_field<'a>(item: &'a Value, key: &str) -> Option<&'a str> {
    item.get(key)
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
}
