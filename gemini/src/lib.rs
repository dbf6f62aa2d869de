//! Minimal Google Gemini API client.
//!
//! This crate provides a focused client for two endpoints of the
//! Generative Language API:
//! - `generateContent` for text and vision requests (with optional
//!   JSON-only response mode)
//! - `predict` for Imagen image generation

use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Errors that can occur when using the Gemini client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Prompt blocked: {reason}")]
    Blocked { reason: String },

    #[error("Model returned no images")]
    NoImages,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Gemini API client.
#[derive(Clone)]
pub struct Gemini {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl Gemini {
    /// Create a new Gemini client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .connect_timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create a Gemini client from the GEMINI_API_KEY environment variable.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| Error::NoApiKey)?;
        Ok(Self::new(api_key))
    }

    /// Set the default model for this client.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Send a content generation request and return the full response.
    pub async fn generate_content(&self, request: Request) -> Result<Response, Error> {
        let model = request.model.clone().unwrap_or_else(|| self.model.clone());
        let url = format!("{API_BASE}/models/{model}:generateContent");
        let api_request = build_api_request(&request);

        let response = self
            .client
            .post(url)
            .headers(self.build_headers()?)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        parse_response(api_response)
    }

    /// Generate images with an Imagen model.
    pub async fn generate_images(
        &self,
        request: ImageRequest,
    ) -> Result<Vec<GeneratedImage>, Error> {
        let model = request.model.clone().unwrap_or_else(|| self.model.clone());
        let url = format!("{API_BASE}/models/{model}:predict");
        let api_request = ApiPredictRequest {
            instances: vec![ApiPredictInstance {
                prompt: request.prompt.clone(),
            }],
            parameters: ApiPredictParameters {
                sample_count: request.sample_count,
            },
        };

        let response = self
            .client
            .post(url)
            .headers(self.build_headers()?)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        let api_response: ApiPredictResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        if api_response.predictions.is_empty() {
            return Err(Error::NoImages);
        }

        let mut images = Vec::with_capacity(api_response.predictions.len());
        for prediction in api_response.predictions {
            let data = base64::engine::general_purpose::STANDARD
                .decode(&prediction.bytes_base64_encoded)
                .map_err(|e| Error::Parse(format!("invalid image payload: {e}")))?;
            images.push(GeneratedImage {
                data,
                mime_type: prediction
                    .mime_type
                    .unwrap_or_else(|| "image/png".to_string()),
            });
        }

        Ok(images)
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?,
        );
        Ok(headers)
    }
}

// ============================================================================
// Public types
// ============================================================================

/// A content generation request.
#[derive(Debug, Clone)]
pub struct Request {
    pub model: Option<String>,
    pub system: Option<String>,
    pub contents: Vec<Content>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<usize>,
    pub response_mime_type: Option<String>,
}

impl Request {
    /// Create a new request with the given contents.
    pub fn new(contents: Vec<Content>) -> Self {
        Self {
            model: None,
            system: None,
            contents,
            temperature: None,
            max_output_tokens: None,
            response_mime_type: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: usize) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    /// Constrain the response to JSON.
    pub fn with_json_response(mut self) -> Self {
        self.response_mime_type = Some("application/json".to_string());
        self
    }
}

/// A turn of the conversation.
#[derive(Debug, Clone)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    /// Create a user turn with text content.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text { text: text.into() }],
        }
    }

    /// Create a user turn with arbitrary parts.
    pub fn user_parts(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }
}

/// The author of a content turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

/// A part of a content turn.
#[derive(Debug, Clone)]
pub enum Part {
    Text { text: String },
    /// Inline binary data such as an image. `data` is base64 encoded.
    InlineData { mime_type: String, data: String },
}

impl Part {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    /// Create an inline data part from raw bytes.
    pub fn inline_data(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Part::InlineData {
            mime_type: mime_type.into(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

/// A content generation response.
#[derive(Debug, Clone)]
pub struct Response {
    pub model_version: Option<String>,
    pub parts: Vec<Part>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

impl Response {
    /// Get all text content concatenated.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    MaxTokens,
    Safety,
    Recitation,
    Other,
}

/// Token usage information.
#[derive(Debug, Clone, Default)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub response_tokens: usize,
}

/// An image generation request.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub model: Option<String>,
    pub prompt: String,
    pub sample_count: usize,
}

impl ImageRequest {
    /// Create a request for a single image.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            model: None,
            prompt: prompt.into(),
            sample_count: 1,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_sample_count(mut self, sample_count: usize) -> Self {
        self.sample_count = sample_count;
        self
    }
}

/// A generated image, decoded to raw bytes.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub data: Vec<u8>,
    pub mime_type: String,
}

// ============================================================================
// Internal API types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiSystemInstruction>,
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<ApiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct ApiSystemInstruction {
    parts: Vec<ApiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum ApiPart {
    #[serde(rename = "text")]
    Text(String),
    #[serde(rename = "inlineData")]
    InlineData(ApiInlineData),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<ApiPromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<ApiUsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsageMetadata {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
}

#[derive(Debug, Serialize)]
struct ApiPredictRequest {
    instances: Vec<ApiPredictInstance>,
    parameters: ApiPredictParameters,
}

#[derive(Debug, Serialize)]
struct ApiPredictInstance {
    prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiPredictParameters {
    sample_count: usize,
}

#[derive(Debug, Deserialize)]
struct ApiPredictResponse {
    #[serde(default)]
    predictions: Vec<ApiPrediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPrediction {
    bytes_base64_encoded: String,
    #[serde(default)]
    mime_type: Option<String>,
}

fn build_api_request(request: &Request) -> ApiRequest {
    let contents = request
        .contents
        .iter()
        .map(|content| ApiContent {
            role: Some(match content.role {
                Role::User => "user".to_string(),
                Role::Model => "model".to_string(),
            }),
            parts: content.parts.iter().map(part_to_api).collect(),
        })
        .collect();

    let generation_config = if request.temperature.is_some()
        || request.max_output_tokens.is_some()
        || request.response_mime_type.is_some()
    {
        Some(ApiGenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_output_tokens,
            response_mime_type: request.response_mime_type.clone(),
        })
    } else {
        None
    };

    ApiRequest {
        system_instruction: request.system.as_ref().map(|system| ApiSystemInstruction {
            parts: vec![ApiPart::Text(system.clone())],
        }),
        contents,
        generation_config,
    }
}

fn part_to_api(part: &Part) -> ApiPart {
    match part {
        Part::Text { text } => ApiPart::Text(text.clone()),
        Part::InlineData { mime_type, data } => ApiPart::InlineData(ApiInlineData {
            mime_type: mime_type.clone(),
            data: data.clone(),
        }),
    }
}

fn parse_response(api_response: ApiResponse) -> Result<Response, Error> {
    let usage = api_response
        .usage_metadata
        .map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            response_tokens: u.candidates_token_count,
        })
        .unwrap_or_default();

    let Some(candidate) = api_response.candidates.into_iter().next() else {
        if let Some(reason) = api_response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
        {
            return Err(Error::Blocked { reason });
        }
        return Err(Error::Parse("response contained no candidates".to_string()));
    };

    let finish_reason = match candidate.finish_reason.as_deref() {
        Some("STOP") | None => FinishReason::Stop,
        Some("MAX_TOKENS") => FinishReason::MaxTokens,
        Some("SAFETY") => FinishReason::Safety,
        Some("RECITATION") => FinishReason::Recitation,
        Some(_) => FinishReason::Other,
    };

    let parts = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .map(|part| match part {
                    ApiPart::Text(text) => Part::Text { text },
                    ApiPart::InlineData(inline) => Part::InlineData {
                        mime_type: inline.mime_type,
                        data: inline.data,
                    },
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Response {
        model_version: api_response.model_version,
        parts,
        finish_reason,
        usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = Gemini::new("test-key");
        assert_eq!(client.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_client_with_model() {
        let client = Gemini::new("test-key").with_model("gemini-2.5-pro");
        assert_eq!(client.model, "gemini-2.5-pro");
    }

    #[test]
    fn test_request_builder() {
        let request = Request::new(vec![Content::user("Hello")])
            .with_system("You are a storyteller")
            .with_temperature(0.7)
            .with_json_response();

        assert!(request.system.is_some());
        assert_eq!(request.temperature, Some(0.7));
        assert_eq!(
            request.response_mime_type.as_deref(),
            Some("application/json")
        );
    }

    #[test]
    fn test_inline_data_is_base64() {
        let part = Part::inline_data("image/png", &[0xDE, 0xAD, 0xBE, 0xEF]);
        match part {
            Part::InlineData { mime_type, data } => {
                assert_eq!(mime_type, "image/png");
                assert_eq!(data, "3q2+7w==");
            }
            _ => panic!("expected inline data part"),
        }
    }

    #[test]
    fn test_api_request_wire_shape() {
        let request = Request::new(vec![Content::user("hi")]).with_json_response();
        let value = serde_json::to_value(build_api_request(&request)).unwrap();

        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(
            value["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn test_parse_response_text() {
        let json = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "Once upon a time"}], "role": "model"},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5},
            "modelVersion": "gemini-2.0-flash"
        }"#;
        let api_response: ApiResponse = serde_json::from_str(json).unwrap();
        let response = parse_response(api_response).unwrap();

        assert_eq!(response.text(), "Once upon a time");
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.usage.prompt_tokens, 10);
    }

    #[test]
    fn test_parse_blocked_response() {
        let json = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let api_response: ApiResponse = serde_json::from_str(json).unwrap();
        match parse_response(api_response) {
            Err(Error::Blocked { reason }) => assert_eq!(reason, "SAFETY"),
            other => panic!("expected blocked error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_predictions() {
        let json = r#"{
            "predictions": [
                {"bytesBase64Encoded": "3q2+7w==", "mimeType": "image/png"}
            ]
        }"#;
        let api_response: ApiPredictResponse = serde_json::from_str(json).unwrap();
        assert_eq!(api_response.predictions.len(), 1);
        assert_eq!(
            api_response.predictions[0].bytes_base64_encoded,
            "3q2+7w=="
        );
    }
}
