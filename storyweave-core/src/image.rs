//! Image generation with bounded retry and prompt repair.
//!
//! Generation failures are retried up to [`MAX_ATTEMPTS`] times per
//! section. The first two attempts reuse the prompt verbatim on the
//! assumption that the failure was transient; before each of attempts
//! 3 to 5 the prompt is rewritten by the text model and the rewrite
//! replaces the working prompt wholesale. Attempt 6 reuses the last
//! rewrite, and its failure aborts the run.

use crate::model::{ContentModel, ContentRequest, ImageModel, ModelError};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

/// Maximum number of generation attempts per image.
pub const MAX_ATTEMPTS: u32 = 6;

/// Errors from the image generation client.
#[derive(Debug, Error)]
pub enum ImageGenError {
    #[error("image generation failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: ModelError,
    },

    #[error("no image has been generated yet")]
    NoImageGenerated,

    #[error("failed to write image: {0}")]
    Io(#[from] std::io::Error),
}

/// A successfully generated image, held in memory until persisted.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub data: Vec<u8>,
    pub mime_type: String,

    /// The prompt that produced the image, possibly a rewrite of the
    /// prompt the caller supplied.
    pub prompt: String,
}

/// Client for generating and persisting section illustrations.
pub struct ImageClient {
    text_model: Arc<dyn ContentModel>,
    image_model: Arc<dyn ImageModel>,
    last: Option<GeneratedImage>,
}

impl ImageClient {
    pub fn new(text_model: Arc<dyn ContentModel>, image_model: Arc<dyn ImageModel>) -> Self {
        Self {
            text_model,
            image_model,
            last: None,
        }
    }

    /// Generate an image for the prompt, retrying with an escalating
    /// strategy. Retry state is local to this call; every call starts
    /// from attempt 1.
    pub async fn generate_image(&mut self, prompt: &str) -> Result<&GeneratedImage, ImageGenError> {
        let mut working = prompt.to_string();
        let mut attempt: u32 = 1;

        loop {
            info!(attempt, "generating image");
            match self.image_model.render(&working).await {
                Ok(artifact) => {
                    return Ok(self.last.insert(GeneratedImage {
                        data: artifact.data,
                        mime_type: artifact.mime_type,
                        prompt: working,
                    }));
                }
                Err(err) => {
                    if attempt >= MAX_ATTEMPTS {
                        return Err(ImageGenError::Exhausted {
                            attempts: attempt,
                            source: err,
                        });
                    }
                    attempt += 1;
                    warn!(%err, attempt, "image generation failed, retrying");
                    if (3..=5).contains(&attempt) {
                        working = self.improve_prompt(&working).await;
                    }
                }
            }
        }
    }

    /// Write the most recently generated image to the given path.
    pub async fn save_image(&self, path: impl AsRef<Path>) -> Result<(), ImageGenError> {
        let image = self.last.as_ref().ok_or(ImageGenError::NoImageGenerated)?;
        fs::write(path.as_ref(), &image.data).await?;
        info!(path = %path.as_ref().display(), "image written");
        Ok(())
    }

    /// Ask the text model for a safer rewrite of a failing prompt. The
    /// rewrite replaces the working prompt wholesale; if the rewrite call
    /// itself fails the current prompt is kept.
    async fn improve_prompt(&self, prompt: &str) -> String {
        let mut request = String::from(include_str!("prompts/improve_prompt.txt"));
        request.push_str("\nORIGINAL_IMAGE_PROMPT:\n");
        request.push_str(prompt);

        match self.text_model.generate(ContentRequest::text(request)).await {
            Ok(improved) => {
                let improved = improved.trim();
                if improved.is_empty() {
                    warn!("prompt rewrite came back empty, keeping current prompt");
                    return prompt.to_string();
                }
                info!(original = prompt, improved, "prompt rewritten");
                improved.to_string()
            }
            Err(err) => {
                warn!(%err, "prompt rewrite failed, keeping current prompt");
                prompt.to_string()
            }
        }
    }
}
