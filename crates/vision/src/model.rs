//! The [`VisionModel`] capability trait and its Gemini implementation.

use async_trait::async_trait;
use base64::Engine;
use serde_json::Value;

use crate::error::VisionError;

/// Default Gemini API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model used by both pipeline stages.
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

/// Raw image bytes plus their MIME type, as downloaded from storage.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// One structured-output request against a vision model.
#[derive(Debug)]
pub struct VisionRequest<'a> {
    /// Fixed stage instruction (what the fields are, where they sit on
    /// the card).
    pub system_instruction: &'a str,
    /// Per-invocation user prompt (candidate payloads, etc.).
    pub prompt: String,
    pub image: &'a ImagePayload,
    /// JSON schema the model output must conform to.
    pub response_schema: Value,
}

/// A vision model that answers image questions with schema-shaped JSON.
///
/// Implementations perform no persistence; given identical inputs they
/// are idempotent up to model non-determinism, which callers absorb
/// with retries rather than caching.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn run(&self, request: VisionRequest<'_>) -> Result<Value, VisionError>;
}

// ---------------------------------------------------------------------------
// Gemini
// ---------------------------------------------------------------------------

/// Gemini `generateContent` client with structured output enforced via
/// `response_mime_type` + `response_schema`.
pub struct GeminiModel {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiModel {
    /// Create a client for the given model id, e.g. [`DEFAULT_MODEL`].
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model,
            api_key,
        }
    }

    /// Point the client at a different endpoint (local proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Model id this client targets.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl VisionModel for GeminiModel {
    async fn run(&self, request: VisionRequest<'_>) -> Result<Value, VisionError> {
        let request_id = uuid::Uuid::new_v4();
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let encoded = base64::engine::general_purpose::STANDARD.encode(&request.image.bytes);
        let body = serde_json::json!({
            "system_instruction": { "parts": [{ "text": request.system_instruction }] },
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": request.prompt },
                    { "inline_data": {
                        "mime_type": request.image.mime_type,
                        "data": encoded,
                    }},
                ],
            }],
            "generationConfig": {
                "response_mime_type": "application/json",
                "response_schema": request.response_schema,
            },
        });

        tracing::debug!(
            request_id = %request_id,
            model = %self.model,
            image_bytes = request.image.bytes.len(),
            "Invoking vision model",
        );

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    VisionError::Timeout
                } else {
                    VisionError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(VisionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| VisionError::InvalidResponse(e.to_string()))?;

        let output = parse_structured_output(&envelope)?;
        tracing::debug!(request_id = %request_id, "Vision model answered");
        Ok(output)
    }
}

/// Pull the structured JSON payload out of a `generateContent`
/// response envelope.
///
/// The payload is the concatenated text of the first candidate's
/// parts, which the API guarantees is a single JSON document when
/// `response_mime_type` is `application/json`.
fn parse_structured_output(envelope: &Value) -> Result<Value, VisionError> {
    let parts = envelope
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| VisionError::InvalidResponse("no candidate content parts".into()))?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();

    if text.is_empty() {
        return Err(VisionError::InvalidResponse("empty candidate text".into()));
    }

    serde_json::from_str(&text)
        .map_err(|e| VisionError::InvalidResponse(format!("candidate text is not JSON: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
