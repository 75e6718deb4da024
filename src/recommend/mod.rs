//! Generation half of the pipeline: prompt the chat model with the candidate
//! set, validate what comes back, and shape the response.

pub mod generator;
pub mod prompt;
pub mod types;

pub use generator::{validate_model_output, GenerationOutcome, RecommendationGenerator};
pub use types::{ChatTurnRequest, ConversationTurn, Recommendation, RecommendationResponse, Role};
