use serde::{Deserialize, Serialize};

use super::generator::GenerationOutcome;

/// A card the model picked, checked against the candidates it was shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub credit_card_name: String,
    pub apply_url: String,
    pub reason: String,
}

/// What `/api/chat` returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResponse {
    pub recommendations: Vec<Recommendation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_model_answer: Option<String>,
}

impl RecommendationResponse {
    /// Packages validated generator output for the caller. The raw answer is
    /// always included, even when no recommendation survived validation.
    pub fn assemble(outcome: GenerationOutcome) -> Self {
        let (recommendations, raw_answer) = outcome.into_parts();
        Self {
            recommendations,
            raw_model_answer: Some(raw_answer),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message of the caller's conversation. Only held by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<Recommendation>>,
}

/// Request body. Either a bare `message`, or the conversation so far, of which
/// only the latest user turn is used.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatTurnRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub messages: Vec<ConversationTurn>,
}

impl ChatTurnRequest {
    pub fn latest_user_message(&self) -> Option<&str> {
        if let Some(message) = self.message.as_deref() {
            return Some(message);
        }
        self.messages
            .iter()
            .rev()
            .find(|turn| turn.role == Role::User)
            .map(|turn| turn.content.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_uses_camel_case_raw_answer() {
        let response = RecommendationResponse {
            recommendations: vec![Recommendation {
                credit_card_name: "A".into(),
                apply_url: "http://x".into(),
                reason: "ok".into(),
            }],
            raw_model_answer: Some("{}".into()),
        };
        let value = serde_json::to_value(&response).expect("serialize");
        assert_eq!(value["rawModelAnswer"], "{}");
        assert_eq!(value["recommendations"][0]["credit_card_name"], "A");
    }

    #[test]
    fn bare_message_request() {
        let request: ChatTurnRequest =
            serde_json::from_value(json!({ "message": "best travel card?" })).expect("parse");
        assert_eq!(request.latest_user_message(), Some("best travel card?"));
    }

    #[test]
    fn conversation_request_uses_latest_user_turn() {
        let request: ChatTurnRequest = serde_json::from_value(json!({
            "messages": [
                { "role": "user", "content": "first question" },
                { "role": "assistant", "content": "answer", "recommendations": [] },
                { "role": "user", "content": "follow-up" },
                { "role": "assistant", "content": "pending" }
            ]
        }))
        .expect("parse");
        assert_eq!(request.latest_user_message(), Some("follow-up"));
    }

    #[test]
    fn empty_request_has_no_message() {
        assert_eq!(ChatTurnRequest::default().latest_user_message(), None);
    }
}
