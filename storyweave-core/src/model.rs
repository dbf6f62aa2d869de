//! Trait seam over generative model backends.
//!
//! The pipeline services talk to two capabilities: content generation
//! (text in, text out, optionally with an inline image) and image
//! rendering. Both are expressed as traits so tests can script responses
//! without network access; the Gemini-backed implementations live here too.

use async_trait::async_trait;
use gemini::{Content, Gemini, ImageRequest, Part, Request};
use std::path::Path;
use thiserror::Error;

/// Errors from a model backend call.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model backend error: {0}")]
    Backend(String),

    #[error("model returned no content")]
    Empty,
}

impl From<gemini::Error> for ModelError {
    fn from(err: gemini::Error) -> Self {
        ModelError::Backend(err.to_string())
    }
}

/// An inline image attached to a content request.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub data: Vec<u8>,
    pub mime_type: String,
}

/// A single request for text output from a text/vision model.
#[derive(Debug, Clone)]
pub struct ContentRequest {
    pub prompt: String,
    pub image: Option<ImagePayload>,
    pub json_only: bool,
}

impl ContentRequest {
    /// Create a plain text request.
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
            json_only: false,
        }
    }

    /// Attach an inline image to the request.
    pub fn with_image(mut self, data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        self.image = Some(ImagePayload {
            data,
            mime_type: mime_type.into(),
        });
        self
    }

    /// Constrain the response to JSON.
    pub fn json_only(mut self) -> Self {
        self.json_only = true;
        self
    }
}

/// A text/vision model.
#[async_trait]
pub trait ContentModel: Send + Sync {
    /// Generate text for the given request.
    async fn generate(&self, request: ContentRequest) -> Result<String, ModelError>;
}

/// A rendered image from an image-generation model.
#[derive(Debug, Clone)]
pub struct ImageArtifact {
    pub data: Vec<u8>,
    pub mime_type: String,
}

/// An image-generation model.
#[async_trait]
pub trait ImageModel: Send + Sync {
    /// Render a single image for the prompt.
    async fn render(&self, prompt: &str) -> Result<ImageArtifact, ModelError>;
}

// ============================================================================
// Gemini-backed implementations
// ============================================================================

/// [`ContentModel`] backed by a Gemini text/vision model.
pub struct GeminiContentModel {
    client: Gemini,
    model: String,
}

impl GeminiContentModel {
    pub fn new(client: Gemini, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ContentModel for GeminiContentModel {
    async fn generate(&self, request: ContentRequest) -> Result<String, ModelError> {
        let mut parts = vec![Part::text(request.prompt)];
        if let Some(image) = request.image {
            parts.push(Part::inline_data(image.mime_type, &image.data));
        }

        let mut api_request =
            Request::new(vec![Content::user_parts(parts)]).with_model(&self.model);
        if request.json_only {
            api_request = api_request.with_json_response();
        }

        let response = self.client.generate_content(api_request).await?;
        let text = response.text();
        if text.trim().is_empty() {
            return Err(ModelError::Empty);
        }
        Ok(text)
    }
}

/// [`ImageModel`] backed by an Imagen model.
pub struct GeminiImageModel {
    client: Gemini,
    model: String,
}

impl GeminiImageModel {
    pub fn new(client: Gemini, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ImageModel for GeminiImageModel {
    async fn render(&self, prompt: &str) -> Result<ImageArtifact, ModelError> {
        let request = ImageRequest::new(prompt).with_model(&self.model);
        let images = self.client.generate_images(request).await?;
        let first = images.into_iter().next().ok_or(ModelError::Empty)?;
        Ok(ImageArtifact {
            data: first.data,
            mime_type: first.mime_type,
        })
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Strip a surrounding Markdown code fence from model output.
///
/// Models often wrap JSON in ```json fences even when asked not to.
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Guess an image MIME type from a file extension. Defaults to PNG.
pub fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/png",
    }
}
