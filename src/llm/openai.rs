//! OpenAI-compatible HTTP provider for embeddings and chat completions.
//!
//! Every call is bounded by the client timeout. Failed calls are not retried
//! unless `max_retries` is raised above zero.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use super::provider::{ChatProvider, EmbeddingProvider};
use super::types::ChatRequest;
use crate::core::config::{AdvisorSettings, ApiKey};
use crate::core::errors::{AdvisorError, ExternalService};

const BODY_SNIPPET_LIMIT: usize = 512;
const RETRY_BASE_DELAY_MS: u64 = 500;
const RETRY_JITTER_MS: u64 = 250;

#[derive(Clone)]
pub struct OpenAiProvider {
    base_url: String,
    api_key: Option<ApiKey>,
    timeout: Duration,
    max_retries: u32,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<ApiKey>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, AdvisorError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdvisorError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            timeout,
            max_retries,
            client,
        })
    }

    pub fn from_settings(settings: &AdvisorSettings) -> Result<Self, AdvisorError> {
        Self::new(
            settings.base_url.clone(),
            settings.api_key.clone(),
            settings.request_timeout,
            settings.max_retries,
        )
    }

    fn api_key(&self) -> Result<&ApiKey, AdvisorError> {
        self.api_key.as_ref().ok_or(AdvisorError::MissingApiKey)
    }

    async fn post_json(
        &self,
        service: ExternalService,
        path: &str,
        body: &Value,
    ) -> Result<Value, AdvisorError> {
        let api_key = self.api_key()?;
        let url = format!("{}/{}", self.base_url, path);
        let mut attempt: u32 = 0;

        loop {
            let outcome = self.post_once(service, api_key, &url, body).await;
            match outcome {
                Err(Failure {
                    error,
                    retryable: true,
                }) if attempt < self.max_retries => {
                    let delay = retry_delay(attempt);
                    attempt += 1;
                    tracing::warn!(
                        "{} call failed ({}); retry {}/{} in {:?}",
                        service,
                        error,
                        attempt,
                        self.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(Failure { error, .. }) => return Err(error),
                Ok(payload) => return Ok(payload),
            }
        }
    }

    async fn post_once(
        &self,
        service: ExternalService,
        api_key: &ApiKey,
        url: &str,
        body: &Value,
    ) -> Result<Value, Failure> {
        let res = self
            .client
            .post(url)
            .bearer_auth(api_key.expose())
            .json(body)
            .send()
            .await
            .map_err(|e| Failure {
                retryable: e.is_timeout() || e.is_connect(),
                error: self.transport_error(service, api_key, &e),
            })?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(Failure {
                retryable: status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error(),
                error: status_error(service, status, &api_key.scrub(&text)),
            });
        }

        res.json::<Value>().await.map_err(|e| Failure {
            retryable: false,
            error: AdvisorError::external_with_details(
                service,
                "response body is not valid JSON",
                api_key.scrub(&e.to_string()),
            ),
        })
    }

    fn transport_error(
        &self,
        service: ExternalService,
        api_key: &ApiKey,
        err: &reqwest::Error,
    ) -> AdvisorError {
        let details = api_key.scrub(&err.to_string());
        if err.is_timeout() {
            AdvisorError::external_with_details(
                service,
                format!("timed out after {:?}", self.timeout),
                details,
            )
        } else if err.is_connect() {
            AdvisorError::external_with_details(
                service,
                format!("could not connect to {}", self.base_url),
                details,
            )
        } else {
            AdvisorError::external_with_details(service, "network error", details)
        }
    }
}

struct Failure {
    error: AdvisorError,
    retryable: bool,
}

fn retry_delay(attempt: u32) -> Duration {
    let jitter = rand::rng().random_range(0..=RETRY_JITTER_MS);
    Duration::from_millis(RETRY_BASE_DELAY_MS.saturating_mul(1u64 << attempt.min(6)) + jitter)
}

fn status_error(service: ExternalService, status: StatusCode, body: &str) -> AdvisorError {
    let provider_message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(|s| s.to_string()));

    let message = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            format!("authentication failed (status {})", status.as_u16())
        }
        StatusCode::TOO_MANY_REQUESTS => "rate limit or quota exceeded (status 429)".to_string(),
        _ => format!("provider returned status {}", status.as_u16()),
    };
    let details = provider_message.unwrap_or_else(|| truncate(body, BODY_SNIPPET_LIMIT));
    if details.is_empty() {
        AdvisorError::external(service, message)
    } else {
        AdvisorError::external_with_details(service, message, details)
    }
}

fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

fn build_chat_body(request: &ChatRequest, model_id: &str) -> Value {
    let mut body = json!({
        "model": model_id,
        "messages": request.messages,
    });

    if let Some(obj) = body.as_object_mut() {
        if let Some(t) = request.temperature {
            obj.insert("temperature".to_string(), json!(t));
        }
        if let Some(t) = request.max_tokens {
            obj.insert("max_tokens".to_string(), json!(t));
        }
        if request.json_object {
            obj.insert("response_format".to_string(), json!({ "type": "json_object" }));
        }
    }
    body
}

fn extract_chat_content(payload: &Value) -> Result<String, AdvisorError> {
    let message = payload["choices"]
        .get(0)
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| {
            AdvisorError::external(
                ExternalService::ChatCompletion,
                "response contained no choices",
            )
        })?;

    match message.get("content").and_then(Value::as_str) {
        Some(content) => Ok(content.to_string()),
        None => {
            let message_text = "response contained no message content";
            match message.get("refusal").and_then(Value::as_str) {
                Some(refusal) => Err(AdvisorError::external_with_details(
                    ExternalService::ChatCompletion,
                    message_text,
                    refusal,
                )),
                None => Err(AdvisorError::external(ExternalService::ChatCompletion, message_text)),
            }
        }
    }
}

fn extract_embeddings(payload: &Value, expected: usize) -> Result<Vec<Vec<f32>>, AdvisorError> {
    let malformed = |what: &str| AdvisorError::external(ExternalService::Embedding, what.to_string());

    let data = payload["data"]
        .as_array()
        .ok_or_else(|| malformed("response has no data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let values = item["embedding"]
            .as_array()
            .ok_or_else(|| malformed("response item has no embedding"))?;
        let vector = values
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| malformed("embedding contains non-numeric values"))?;
        let index = item["index"].as_u64().map(|i| i as usize).unwrap_or(position);
        indexed.push((index, vector));
    }

    if indexed.len() != expected {
        return Err(AdvisorError::external(
            ExternalService::Embedding,
            format!("expected {} embeddings, got {}", expected, indexed.len()),
        ));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, AdvisorError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let body = json!({
            "model": model_id,
            "input": inputs,
        });
        let payload = self
            .post_json(ExternalService::Embedding, "embeddings", &body)
            .await?;
        extract_embeddings(&payload, inputs.len())
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, AdvisorError> {
        let body = build_chat_body(&request, model_id);
        let payload = self
            .post_json(ExternalService::ChatCompletion, "chat/completions", &body)
            .await?;
        extract_chat_content(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::ChatMessage;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    async fn serve(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}/v1", addr)
    }

    fn provider(base_url: String, retries: u32) -> OpenAiProvider {
        OpenAiProvider::new(
            base_url,
            ApiKey::new("sk-test-secret"),
            Duration::from_secs(2),
            retries,
        )
        .expect("provider")
    }

    #[test]
    fn chat_body_requests_json_object() {
        let request = ChatRequest::new(vec![ChatMessage::user("hi")])
            .with_temperature(0.2)
            .with_max_tokens(100)
            .json_object();
        let body = build_chat_body(&request, "gpt-4o-mini");
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn embeddings_are_reordered_by_index() {
        let payload = json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        });
        let vectors = extract_embeddings(&payload, 2).expect("vectors");
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn embedding_count_mismatch_is_an_error() {
        let payload = json!({ "data": [] });
        assert!(extract_embeddings(&payload, 1).is_err());
    }

    #[test]
    fn missing_choices_is_an_error() {
        let err = extract_chat_content(&json!({ "choices": [] })).unwrap_err();
        assert!(matches!(err, AdvisorError::ExternalService { .. }));
    }

    #[test]
    fn refusal_without_content_is_an_error() {
        let payload = json!({
            "choices": [{ "message": { "role": "assistant", "content": null, "refusal": "I can't help with that." } }]
        });
        let err = extract_chat_content(&payload).unwrap_err();
        assert!(err.to_string().contains("no message content"));
        assert_eq!(err.details(), Some("I can't help with that."));

        let missing = json!({ "choices": [{ "message": { "role": "assistant" } }] });
        let err = extract_chat_content(&missing).unwrap_err();
        assert!(matches!(err, AdvisorError::ExternalService { details: None, .. }));
    }

    #[test]
    fn status_error_uses_provider_message() {
        let body = r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota"}}"#;
        let err = status_error(ExternalService::ChatCompletion, StatusCode::TOO_MANY_REQUESTS, body);
        assert!(err.to_string().contains("quota exceeded"));
        assert_eq!(err.details(), Some("You exceeded your current quota"));
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let provider = OpenAiProvider::new(
            "http://127.0.0.1:9/v1",
            None,
            Duration::from_secs(1),
            0,
        )
        .expect("provider");
        let err = provider
            .embed(&["hello".to_string()], "text-embedding-3-small")
            .await
            .unwrap_err();
        assert!(matches!(err, AdvisorError::MissingApiKey));
    }

    #[tokio::test]
    async fn chat_round_trip_against_local_server() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(
                    headers.get("authorization").and_then(|v| v.to_str().ok()),
                    Some("Bearer sk-test-secret")
                );
                assert_eq!(body["response_format"]["type"], "json_object");
                Json(json!({
                    "choices": [{ "message": { "role": "assistant", "content": "{\"cards\":[]}" } }]
                }))
            }),
        );
        let base_url = serve(app).await;

        let request = ChatRequest::new(vec![ChatMessage::user("hi")]).json_object();
        let content = provider(base_url, 0)
            .chat(request, "gpt-4o-mini")
            .await
            .expect("chat");
        assert_eq!(content, "{\"cards\":[]}");
    }

    #[tokio::test]
    async fn auth_failure_does_not_leak_the_key() {
        let app = Router::new().route(
            "/v1/embeddings",
            post(|| async {
                (
                    axum::http::StatusCode::UNAUTHORIZED,
                    Json(json!({ "error": { "message": "Incorrect API key provided: sk-test-secret" } })),
                )
            }),
        );
        let base_url = serve(app).await;

        let err = provider(base_url, 0)
            .embed(&["q".to_string()], "text-embedding-3-small")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("authentication failed"));
        let details = err.details().expect("details");
        assert!(!details.contains("sk-test-secret"));
        assert!(details.contains("****"));
    }

    #[tokio::test]
    async fn server_errors_are_retried_when_enabled() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let app = Router::new().route(
            "/v1/embeddings",
            post(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        (axum::http::StatusCode::SERVICE_UNAVAILABLE, Json(json!({})))
                    } else {
                        (
                            axum::http::StatusCode::OK,
                            Json(json!({ "data": [{ "index": 0, "embedding": [0.6, 0.8] }] })),
                        )
                    }
                }
            }),
        );
        let base_url = serve(app).await;

        let vectors = provider(base_url, 1)
            .embed(&["q".to_string()], "text-embedding-3-small")
            .await
            .expect("second attempt succeeds");
        assert_eq!(vectors, vec![vec![0.6, 0.8]]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failures_are_not_retried_by_default() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let app = Router::new().route(
            "/v1/chat/completions",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "boom")
                }
            }),
        );
        let base_url = serve(app).await;

        let err = provider(base_url, 0)
            .chat(ChatRequest::new(vec![ChatMessage::user("hi")]), "gpt-4o-mini")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("status 500"));
        assert_eq!(err.details(), Some("boom"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_provider_times_out_without_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let app = Router::new().route(
            "/v1/embeddings",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    Json(json!({ "data": [{ "index": 0, "embedding": [1.0] }] }))
                }
            }),
        );
        let base_url = serve(app).await;

        let provider = OpenAiProvider::new(
            base_url,
            ApiKey::new("sk-test-secret"),
            Duration::from_millis(200),
            0,
        )
        .expect("provider");
        let started = std::time::Instant::now();
        let err = provider
            .embed(&["q".to_string()], "text-embedding-3-small")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AdvisorError::ExternalService {
                service: ExternalService::Embedding,
                ..
            }
        ));
        assert!(err.to_string().contains("timed out after 200ms"));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
