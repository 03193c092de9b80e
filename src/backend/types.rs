//! Wire types and errors for the generation runtime.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sampling parameters for one generation request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplingParams {
    pub max_new_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
}

/// One generation request: the prompt text so far plus its constraints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub text: String,
    pub sampling_params: SamplingParams,
}

/// Generate response body
#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    pub text: String,
    #[serde(default)]
    pub meta_info: Option<serde_json::Value>,
}

/// Model info reported by the runtime
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    #[serde(default)]
    pub model_path: Option<String>,
    #[serde(default)]
    pub is_generation: Option<bool>,
}

/// Errors talking to the generation runtime.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to {url} failed after {attempts} attempt(s): {source}")]
    Transport {
        url: String,
        attempts: usize,
        #[source]
        source: reqwest::Error,
    },

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to read backend response: {0}")]
    Body(#[source] reqwest::Error),

    #[error("failed to parse backend response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid backend URL: {0}")]
    Url(#[from] url::ParseError),
}

impl BackendError {
    pub fn from_status(status: StatusCode, body: String) -> Self {
        let body = if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        } else {
            body
        };
        BackendError::Status {
            status: status.as_u16(),
            body,
        }
    }
}

pub(super) fn is_retriable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}
