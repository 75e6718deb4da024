use std::fmt;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

/// The external collaborator a failed call was addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalService {
    Embedding,
    ChatCompletion,
}

impl fmt::Display for ExternalService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalService::Embedding => f.write_str("embedding"),
            ExternalService::ChatCompletion => f.write_str("chat completion"),
        }
    }
}

const MISSING_API_KEY: &str =
    "OPENAI_API_KEY is not set; the language-model provider cannot be reached";

/// Failures a recommendation request can end with.
///
/// Malformed model output and hallucinated card names are not represented here:
/// the generator recovers from both locally.
#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Configuration error for the one setting every request depends on.
    #[error("configuration error: {}", MISSING_API_KEY)]
    MissingApiKey,

    #[error("{service} request failed: {message}")]
    ExternalService {
        service: ExternalService,
        message: String,
        details: Option<String>,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl AdvisorError {
    pub fn external(service: ExternalService, message: impl Into<String>) -> Self {
        AdvisorError::ExternalService {
            service,
            message: message.into(),
            details: None,
        }
    }

    pub fn external_with_details(
        service: ExternalService,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        AdvisorError::ExternalService {
            service,
            message: message.into(),
            details: Some(details.into()),
        }
    }

    pub fn details(&self) -> Option<&str> {
        match self {
            AdvisorError::ExternalService { details, .. } => details.as_deref(),
            _ => None,
        }
    }
}

/// Failures while loading the card corpus or the embeddings store at startup.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid card data: {0}")]
    InvalidCard(String),

    #[error("invalid embeddings store: {0}")]
    InvalidStore(String),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("service misconfigured: {message}")]
    Misconfigured {
        message: String,
        details: Option<String>,
    },
    #[error("upstream error: {message}")]
    Upstream {
        message: String,
        details: Option<String>,
    },
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<AdvisorError> for ApiError {
    fn from(err: AdvisorError) -> Self {
        match err {
            AdvisorError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            AdvisorError::Configuration(msg) => ApiError::Misconfigured {
                message: msg,
                details: None,
            },
            AdvisorError::MissingApiKey => ApiError::Misconfigured {
                message: MISSING_API_KEY.to_string(),
                details: Some(
                    "Set OPENAI_API_KEY (or openai.api_key in secrets.yaml) and restart the server."
                        .to_string(),
                ),
            },
            AdvisorError::ExternalService {
                service,
                message,
                details,
            } => ApiError::Upstream {
                message: format!("{} request failed: {}", service, message),
                details,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::Misconfigured { message, details } => {
                (StatusCode::SERVICE_UNAVAILABLE, message, details)
            }
            ApiError::Upstream { message, details } => (StatusCode::BAD_GATEWAY, message, details),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None),
        };

        let body = match details {
            Some(details) => json!({ "error": message, "details": details }),
            None => json!({ "error": message }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_maps_to_service_unavailable() {
        let api: ApiError = AdvisorError::Configuration("retrieval.top_k is out of range".into()).into();
        match &api {
            ApiError::Misconfigured { details, .. } => assert!(details.is_none()),
            other => panic!("unexpected mapping: {other:?}"),
        }
        assert_eq!(api.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn only_a_missing_key_carries_the_key_hint() {
        match ApiError::from(AdvisorError::MissingApiKey) {
            ApiError::Misconfigured { message, details } => {
                assert!(message.starts_with("OPENAI_API_KEY is not set"));
                assert!(details.expect("hint").contains("secrets.yaml"));
            }
            other => panic!("unexpected mapping: {other:?}"),
        }
    }

    #[test]
    fn external_error_keeps_details() {
        let err = AdvisorError::external_with_details(
            ExternalService::ChatCompletion,
            "status 429",
            "quota exceeded",
        );
        assert_eq!(err.details(), Some("quota exceeded"));

        match ApiError::from(err) {
            ApiError::Upstream { message, details } => {
                assert!(message.starts_with("chat completion request failed"));
                assert_eq!(details.as_deref(), Some("quota exceeded"));
            }
            other => panic!("unexpected mapping: {other:?}"),
        }
    }

    #[test]
    fn invalid_request_maps_to_bad_request() {
        let response = ApiError::from(AdvisorError::InvalidRequest("empty".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
