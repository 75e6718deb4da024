//! Renders retrieved cards into the candidate block of the generation prompt.
//!
//! One line per card: `name | {attributes as compact JSON} | apply_url`.

use super::retriever::ScoredCard;
use crate::cards::CreditCard;

pub fn format_card_line(card: &CreditCard) -> String {
    format!(
        "{} | {} | {}",
        card.name,
        card.attributes_json(),
        card.apply_url
    )
}

/// Joins one line per candidate with `\n`, preserving ranking order.
pub fn format_candidates(candidates: &[ScoredCard]) -> String {
    candidates
        .iter()
        .map(|candidate| format_card_line(&candidate.card))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The candidate set for one request: the retrieved cards and their prompt text.
#[derive(Debug, Clone, Default)]
pub struct CandidateContext {
    cards: Vec<ScoredCard>,
    text: String,
}

impl CandidateContext {
    pub fn build(cards: Vec<ScoredCard>) -> Self {
        let text = format_candidates(&cards);
        Self { cards, text }
    }

    pub fn cards(&self) -> &[ScoredCard] {
        &self.cards
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn find_by_name(&self, name: &str) -> Option<&CreditCard> {
        self.cards
            .iter()
            .map(|candidate| candidate.card.as_ref())
            .find(|card| card.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}
