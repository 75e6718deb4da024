use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use tracing::Instrument;
use uuid::Uuid;

use crate::core::errors::ApiError;
use crate::recommend::ChatTurnRequest;
use crate::state::AppState;

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatTurnRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = payload
        .latest_user_message()
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .ok_or_else(|| ApiError::BadRequest("a non-empty user message is required".to_string()))?
        .to_string();

    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("chat", %request_id);
    let result = state.pipeline.recommend(&message).instrument(span).await;

    match result {
        Ok(response) => Ok(Json(response)),
        Err(err) => {
            tracing::warn!(%request_id, "Recommendation request failed: {}", err);
            Err(err.into())
        }
    }
}
