use std::fmt;
use std::time::Duration;

use serde_json::Value;

use super::defaults::*;
use crate::core::errors::AdvisorError;

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_CHAT_MODEL: &str = "OPENAI_CHAT_MODEL";
pub const ENV_EMBEDDING_MODEL: &str = "OPENAI_EMBEDDING_MODEL";
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_TOP_K: &str = "TOP_K";

/// Provider credential. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(ApiKey(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Replaces every occurrence of the key in `text`.
    pub fn scrub(&self, text: &str) -> String {
        text.replace(&self.0, "****")
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(****)")
    }
}

/// Typed view over the merged configuration.
#[derive(Debug, Clone)]
pub struct AdvisorSettings {
    pub api_key: Option<ApiKey>,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub top_k: usize,
    pub temperature: f64,
    pub max_tokens: u32,
    pub cards_path: String,
    pub embeddings_path: String,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for AdvisorSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            top_k: DEFAULT_TOP_K,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            cards_path: DEFAULT_CARDS_PATH.to_string(),
            embeddings_path: DEFAULT_EMBEDDINGS_PATH.to_string(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl AdvisorSettings {
    /// Reads settings out of an already validated config tree.
    pub fn from_config(config: &Value) -> Self {
        let defaults = Self::default();
        let openai = config.get("openai");
        let retrieval = config.get("retrieval");
        let generation = config.get("generation");
        let data = config.get("data");

        let string_at = |section: Option<&Value>, key: &str, fallback: &str| -> String {
            section
                .and_then(|v| v.get(key))
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(fallback)
                .to_string()
        };
        let u64_at = |section: Option<&Value>, key: &str| -> Option<u64> {
            section.and_then(|v| v.get(key)).and_then(|v| v.as_u64())
        };

        let cors_allowed_origins = config
            .get("server")
            .and_then(|v| v.get("cors_allowed_origins"))
            .and_then(|v| v.as_array())
            .map(|list| {
                list.iter()
                    .filter_map(|item| item.as_str())
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(|item| item.to_string())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            api_key: openai
                .and_then(|v| v.get("api_key"))
                .and_then(|v| v.as_str())
                .and_then(ApiKey::new),
            base_url: string_at(openai, "base_url", &defaults.base_url)
                .trim_end_matches('/')
                .to_string(),
            chat_model: string_at(openai, "chat_model", &defaults.chat_model),
            embedding_model: string_at(openai, "embedding_model", &defaults.embedding_model),
            request_timeout: u64_at(openai, "request_timeout_secs")
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            max_retries: u64_at(openai, "max_retries")
                .map(|v| v as u32)
                .unwrap_or(defaults.max_retries),
            top_k: u64_at(retrieval, "top_k")
                .map(|v| v as usize)
                .unwrap_or(defaults.top_k),
            temperature: generation
                .and_then(|v| v.get("temperature"))
                .and_then(|v| v.as_f64())
                .unwrap_or(defaults.temperature),
            max_tokens: u64_at(generation, "max_tokens")
                .map(|v| v as u32)
                .unwrap_or(defaults.max_tokens),
            cards_path: string_at(data, "cards_path", &defaults.cards_path),
            embeddings_path: string_at(data, "embeddings_path", &defaults.embeddings_path),
            cors_allowed_origins,
        }
    }

    /// Applies environment overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env_overrides<F>(mut self, lookup: F) -> Result<Self, AdvisorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(ENV_API_KEY).and_then(ApiKey::new) {
            self.api_key = Some(key);
        }
        if let Some(model) = non_empty(ENV_CHAT_MODEL) {
            self.chat_model = model.trim().to_string();
        }
        if let Some(model) = non_empty(ENV_EMBEDDING_MODEL) {
            self.embedding_model = model.trim().to_string();
        }
        if let Some(url) = non_empty(ENV_BASE_URL) {
            self.base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(raw) = non_empty(ENV_TOP_K) {
            let top_k = raw.trim().parse::<usize>().map_err(|_| {
                AdvisorError::Configuration(format!(
                    "{} must be a positive integer, got '{}'",
                    ENV_TOP_K, raw
                ))
            })?;
            if !(1..=MAX_TOP_K).contains(&top_k) {
                return Err(AdvisorError::Configuration(format!(
                    "{} must be between 1 and {}, got {}",
                    ENV_TOP_K, MAX_TOP_K, top_k
                )));
            }
            self.top_k = top_k;
        }

        Ok(self)
    }

    /// The credential, or the configuration error every request fails with
    /// while it is missing.
    pub fn require_api_key(&self) -> Result<&ApiKey, AdvisorError> {
        self.api_key.as_ref().ok_or(AdvisorError::MissingApiKey)
    }
}
