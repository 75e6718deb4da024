use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let pipeline = &state.pipeline;
    let store = pipeline.store();
    Json(json!({
        "initialized": true,
        "credential_configured": pipeline.has_credential(),
        "cards": state.corpus.len(),
        "embeddings": {
            "entries": store.len(),
            "dimensions": store.dimensions(),
            "model": store.model(),
            "generated_at": store.generated_at(),
        },
        "chat_model": pipeline.chat_model(),
        "embedding_model": pipeline.embedding_model(),
        "retriever": pipeline.retriever_name(),
        "top_k": pipeline.top_k(),
        "uptime_secs": (Utc::now() - state.started_at).num_seconds(),
    }))
}
