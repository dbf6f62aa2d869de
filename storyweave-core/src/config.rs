//! Model selection configuration.
//!
//! Model choices are passed explicitly into each service constructor;
//! nothing in the pipeline reads the process environment on its own.

use thiserror::Error;

/// Default text/vision model for story, palette and theme requests.
pub const DEFAULT_IMAGE_TO_TEXT_MODEL: &str = "gemini-2.0-flash";

/// Default image generation model.
pub const DEFAULT_VISION_MODEL: &str = "imagen-3.0-generate-002";

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),
}

/// Which models the pipeline talks to.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Model used for text generation, vision analysis and prompt rewrites.
    pub image_to_text_model: String,

    /// Model used to render section illustrations.
    pub vision_model: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            image_to_text_model: DEFAULT_IMAGE_TO_TEXT_MODEL.to_string(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
        }
    }
}

impl ModelConfig {
    /// Create a config with explicit model names.
    pub fn new(image_to_text_model: impl Into<String>, vision_model: impl Into<String>) -> Self {
        Self {
            image_to_text_model: image_to_text_model.into(),
            vision_model: vision_model.into(),
        }
    }

    /// Load model names from IMAGE_TO_TEXT_MODEL and VISION_MODEL.
    pub fn from_env() -> Result<Self, ConfigError> {
        let image_to_text_model = std::env::var("IMAGE_TO_TEXT_MODEL")
            .map_err(|_| ConfigError::MissingVar("IMAGE_TO_TEXT_MODEL"))?;
        let vision_model =
            std::env::var("VISION_MODEL").map_err(|_| ConfigError::MissingVar("VISION_MODEL"))?;
        Ok(Self {
            image_to_text_model,
            vision_model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_models() {
        let config = ModelConfig::default();
        assert_eq!(config.image_to_text_model, DEFAULT_IMAGE_TO_TEXT_MODEL);
        assert_eq!(config.vision_model, DEFAULT_VISION_MODEL);
    }

    #[test]
    fn test_explicit_models() {
        let config = ModelConfig::new("gemini-2.5-pro", "imagen-4.0");
        assert_eq!(config.image_to_text_model, "gemini-2.5-pro");
        assert_eq!(config.vision_model, "imagen-4.0");
    }
}
