//! services/api/src/adapters/gemini.rs
//!
//! This module contains the adapter for the Google Gemini `generateContent` REST API.
//! It implements the `VisionModelService` port from the `core` crate.

use async_trait::async_trait;
use healthlens_core::ports::{PortError, PortResult, VisionModelService};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

// Low temperature keeps the model close to the requested JSON schema.
const TEMPERATURE: f32 = 0.3;
const TOP_K: u32 = 40;
const TOP_P: f32 = 0.95;
const MAX_OUTPUT_TOKENS: u32 = 8192;

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: TEMPERATURE,
            top_k: TOP_K,
            top_p: TOP_P,
            max_output_tokens: MAX_OUTPUT_TOKENS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `VisionModelService` using the Gemini REST API.
#[derive(Clone)]
pub struct GeminiAdapter {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiAdapter {
    /// Creates a new `GeminiAdapter`. A blank API key is rejected immediately.
    pub fn new(
        api_key: &str,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> PortResult<Self> {
        if api_key.trim().is_empty() {
            return Err(PortError::Configuration(
                "GEMINI_API_KEY is not configured".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PortError::Unexpected(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.trim().to_string(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn build_request_body<'a>(
        prompt: &'a str,
        image_base64: &'a str,
        mime_type: &'a str,
    ) -> GenerateContentRequest<'a> {
        GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: prompt },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type,
                            data: image_base64,
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig::default(),
        }
    }

    /// Joins the text parts of the first candidate.
    fn extract_text(response: GenerateContentResponse) -> Option<String> {
        let content = response.candidates.into_iter().next()?.content?;
        let text: String = content
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }

    fn status_error(status: StatusCode, body: &str) -> PortError {
        let bad_key = status == StatusCode::BAD_REQUEST && body.contains("API_KEY_INVALID");
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PortError::Configuration(format!(
                "Gemini API rejected the credential: {} - {}",
                status, body
            )),
            _ if bad_key => PortError::Configuration(format!(
                "Gemini API rejected the credential: {} - {}",
                status, body
            )),
            _ => PortError::Unexpected(format!("Gemini API request failed: {} - {}", status, body)),
        }
    }
}

fn transport_error(e: reqwest::Error) -> PortError {
    if e.is_timeout() {
        PortError::Timeout("Gemini API did not respond in time".to_string())
    } else {
        PortError::Unexpected(format!("Gemini API request failed: {}", e))
    }
}

//=========================================================================================
// `VisionModelService` Trait Implementation
//=========================================================================================

#[async_trait]
impl VisionModelService for GeminiAdapter {
    async fn generate_from_image(
        &self,
        prompt: &str,
        image_base64: &str,
        mime_type: &str,
    ) -> PortResult<String> {
        let body = Self::build_request_body(prompt, image_base64, mime_type);

        debug!(model = %self.model, "Sending request to Gemini API.");
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error: {} - {}", status, error_text);
            return Err(Self::status_error(status, &error_text));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(transport_error)?;

        Self::extract_text(parsed)
            .ok_or_else(|| PortError::Unexpected("No response from Gemini API".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, Json, Router};
    use serde_json::{json, Value};

    /// Serves `app` on an ephemeral local port and returns its base URL.
    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn adapter_for(base_url: &str, timeout: Duration) -> GeminiAdapter {
        GeminiAdapter::new("test-key", "gemini-test", base_url, timeout).unwrap()
    }

    #[test]
    fn blank_key_fails_at_construction() {
        let err = GeminiAdapter::new("  ", "m", "http://x", Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(matches!(err, PortError::Configuration(_)));
    }

    #[test]
    fn endpoint_targets_configured_model() {
        let adapter = GeminiAdapter::new(
            "key",
            "gemini-2.0-flash-exp",
            "https://generativelanguage.googleapis.com/v1beta/",
            Duration::from_secs(60),
        )
        .unwrap();
        assert_eq!(
            adapter.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash-exp:generateContent"
        );
    }

    #[test]
    fn request_body_carries_prompt_image_and_sampling() {
        let body = serde_json::to_value(GeminiAdapter::build_request_body(
            "Analyze this",
            "AAAA",
            "image/jpeg",
        ))
        .unwrap();

        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "Analyze this");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/jpeg");
        assert_eq!(parts[1]["inline_data"]["data"], "AAAA");

        let config = &body["generationConfig"];
        assert_eq!(config["topK"], 40);
        assert_eq!(config["maxOutputTokens"], 8192);
        assert!((config["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
        assert!((config["topP"].as_f64().unwrap() - 0.95).abs() < 1e-6);
    }

    #[test]
    fn text_parts_of_first_candidate_are_joined() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [
                { "content": { "parts": [{ "text": "```json\n{" }, { "text": "}\n```" }] } },
                { "content": { "parts": [{ "text": "ignored" }] } }
            ]
        }))
        .unwrap();
        assert_eq!(
            GeminiAdapter::extract_text(response).as_deref(),
            Some("```json\n{}\n```")
        );
    }

    #[test]
    fn empty_candidates_yield_nothing() {
        let response: GenerateContentResponse =
            serde_json::from_value(serde_json::json!({ "candidates": [] })).unwrap();
        assert!(GeminiAdapter::extract_text(response).is_none());

        let blocked: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        }))
        .unwrap();
        assert!(GeminiAdapter::extract_text(blocked).is_none());
    }

    #[test]
    fn auth_failures_map_to_configuration() {
        assert!(matches!(
            GeminiAdapter::status_error(StatusCode::FORBIDDEN, "denied"),
            PortError::Configuration(_)
        ));
        assert!(matches!(
            GeminiAdapter::status_error(StatusCode::BAD_REQUEST, "{\"reason\": \"API_KEY_INVALID\"}"),
            PortError::Configuration(_)
        ));
        assert!(matches!(
            GeminiAdapter::status_error(StatusCode::TOO_MANY_REQUESTS, "quota"),
            PortError::Unexpected(msg) if msg.contains("429")
        ));
    }

    #[tokio::test]
    async fn slow_upstream_maps_to_timeout() {
        let base_url = serve(Router::new().fallback(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "too late"
        }))
        .await;
        let adapter = adapter_for(&base_url, Duration::from_millis(100));

        let err = adapter
            .generate_from_image("prompt", "AAAA", "image/jpeg")
            .await
            .unwrap_err();

        assert!(matches!(err, PortError::Timeout(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn forbidden_reply_maps_to_configuration() {
        let base_url = serve(Router::new().fallback(|| async {
            (StatusCode::FORBIDDEN, "permission denied")
        }))
        .await;
        let adapter = adapter_for(&base_url, Duration::from_secs(5));

        let err = adapter
            .generate_from_image("prompt", "AAAA", "image/jpeg")
            .await
            .unwrap_err();

        assert!(matches!(err, PortError::Configuration(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn request_carries_key_and_reply_text_is_returned() {
        let base_url = serve(Router::new().fallback(
            |headers: HeaderMap, Json(body): Json<Value>| async move {
                if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) != Some("test-key") {
                    return (StatusCode::UNAUTHORIZED, Json(json!({})));
                }
                let echoed = body["contents"][0]["parts"][0]["text"].clone();
                (
                    StatusCode::OK,
                    Json(json!({ "candidates": [{ "content": { "parts": [{ "text": echoed }] } }] })),
                )
            },
        ))
        .await;
        let adapter = adapter_for(&base_url, Duration::from_secs(5));

        let text = adapter
            .generate_from_image("{\"quickSummary\":\"ok\"}", "AAAA", "image/jpeg")
            .await
            .unwrap();

        assert_eq!(text, "{\"quickSummary\":\"ok\"}");
    }
}
