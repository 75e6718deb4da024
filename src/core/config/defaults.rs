use serde_json::{json, Value};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_TOP_K: usize = 12;
pub const MAX_TOP_K: usize = 1_000;
pub const DEFAULT_TEMPERATURE: f64 = 0.2;
pub const DEFAULT_MAX_TOKENS: u32 = 800;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 0;
pub const DEFAULT_CARDS_PATH: &str = "data/cards.json";
pub const DEFAULT_EMBEDDINGS_PATH: &str = "data/embeddings.json";

/// Lowest layer of the merged configuration. Files and env vars override it.
pub fn generate_default_config() -> Value {
    json!({
        "openai": {
            "base_url": DEFAULT_BASE_URL,
            "chat_model": DEFAULT_CHAT_MODEL,
            "embedding_model": DEFAULT_EMBEDDING_MODEL,
            "request_timeout_secs": DEFAULT_REQUEST_TIMEOUT_SECS,
            "max_retries": DEFAULT_MAX_RETRIES,
        },
        "retrieval": {
            "top_k": DEFAULT_TOP_K,
        },
        "generation": {
            "temperature": DEFAULT_TEMPERATURE,
            "max_tokens": DEFAULT_MAX_TOKENS,
        },
        "data": {
            "cards_path": DEFAULT_CARDS_PATH,
            "embeddings_path": DEFAULT_EMBEDDINGS_PATH,
        },
    })
}
