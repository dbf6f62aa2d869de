//! Pipeline orchestration.
//!
//! A run is a single pass: generate the story draft, then for each
//! section in order generate and persist an illustration and extract
//! its palette, then synthesize the page theme, then assemble and
//! write the HTML document. Sections are strictly sequential because
//! palette accumulation order is part of the synthesis input. Any
//! stage failure aborts the run with no partial output and no
//! resumption.

use crate::config::{ConfigError, ModelConfig};
use crate::html::{assemble, AssembledSection};
use crate::image::{ImageClient, ImageGenError};
use crate::model::{ContentModel, GeminiContentModel, GeminiImageModel, ImageModel};
use crate::story::{StoryError, StoryGenerator, StoryRequest};
use crate::theme::{
    PaletteError, StoryTheme, ThemeExtractor, ThemeSynthesisError, ThemeSynthesizer,
};
use gemini::Gemini;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tracing::info;
use uuid::Uuid;

/// Errors from a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("story generation failed: {0}")]
    Story(#[from] StoryError),

    #[error("image generation failed: {0}")]
    Image(#[from] ImageGenError),

    #[error("palette extraction failed: {0}")]
    Palette(#[from] PaletteError),

    #[error("theme synthesis failed: {0}")]
    Theme(#[from] ThemeSynthesisError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from pipeline construction.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("gemini client: {0}")]
    Client(#[from] gemini::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Configuration for a pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory that receives one subdirectory per run.
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("outputs"),
        }
    }
}

impl PipelineConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

/// A persisted section illustration.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub section_id: String,
    pub file_path: PathBuf,

    /// The prompt that produced the image, possibly rewritten.
    pub source_prompt: String,
}

/// The write-once result of a pipeline run.
#[derive(Debug)]
pub struct RenderedStory {
    pub run_id: Uuid,
    pub theme: StoryTheme,
    pub html: String,
    pub document_path: PathBuf,
    pub images: Vec<ImageRecord>,
}

/// The end-to-end story pipeline.
///
/// Each concurrent run needs its own instance; output paths are
/// namespaced per run so instances never collide on disk.
pub struct Pipeline {
    story: StoryGenerator,
    images: ImageClient,
    extractor: ThemeExtractor,
    synthesizer: ThemeSynthesizer,
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline over explicit model backends.
    pub fn new(
        text_model: Arc<dyn ContentModel>,
        image_model: Arc<dyn ImageModel>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            story: StoryGenerator::new(text_model.clone()),
            images: ImageClient::new(text_model.clone(), image_model),
            extractor: ThemeExtractor::new(text_model.clone()),
            synthesizer: ThemeSynthesizer::new(text_model),
            config,
        }
    }

    /// Create a pipeline over Gemini with the given model selection.
    pub fn with_gemini(client: Gemini, models: &ModelConfig, config: PipelineConfig) -> Self {
        let text_model = Arc::new(GeminiContentModel::new(
            client.clone(),
            models.image_to_text_model.as_str(),
        ));
        let image_model = Arc::new(GeminiImageModel::new(
            client,
            models.vision_model.as_str(),
        ));
        Self::new(text_model, image_model, config)
    }

    /// Create a pipeline from GEMINI_API_KEY, with model selection from
    /// IMAGE_TO_TEXT_MODEL / VISION_MODEL when set.
    pub fn from_env(config: PipelineConfig) -> Result<Self, SetupError> {
        let client = Gemini::from_env()?;
        let models = ModelConfig::from_env().unwrap_or_default();
        Ok(Self::with_gemini(client, &models, config))
    }

    /// Run the pipeline once.
    pub async fn run(&mut self, request: &StoryRequest) -> Result<RenderedStory, PipelineError> {
        let run_id = Uuid::new_v4();
        info!(%run_id, "starting story pipeline");

        let draft = self.story.generate(request).await?;

        let run_dir = self.config.output_dir.join(run_id.to_string());
        fs::create_dir_all(&run_dir).await?;

        // Strictly in section order: the palette list the synthesizer
        // sees is ordered by section.
        let mut palettes = Vec::with_capacity(draft.sections().len());
        let mut records = Vec::with_capacity(draft.sections().len());
        for section in draft.sections() {
            let source_prompt = self
                .images
                .generate_image(&section.image_prompt)
                .await?
                .prompt
                .clone();

            let file_path = run_dir.join(format!("{}.png", section.id));
            self.images.save_image(&file_path).await?;
            info!(section = %section.id, "section illustrated");

            palettes.push(self.extractor.extract_palette(&file_path).await?);
            records.push(ImageRecord {
                section_id: section.id.clone(),
                file_path,
                source_prompt,
            });
        }

        let theme = self
            .synthesizer
            .synthesize(&draft.theme_hint, &palettes)
            .await?;

        let sections: Vec<AssembledSection> = draft
            .sections()
            .iter()
            .map(|section| AssembledSection {
                ordinal: section.ordinal,
                // The document sits in the run directory next to the
                // images, so a bare file name resolves.
                image_src: format!("{}.png", section.id),
                text: section.narrative.clone(),
            })
            .collect();
        let html = assemble(&theme, &draft.title, &draft.introduction, &sections);

        let document_path = run_dir.join("story.html");
        fs::write(&document_path, &html).await?;
        info!(path = %document_path.display(), "story written");

        Ok(RenderedStory {
            run_id,
            theme,
            html,
            document_path,
            images: records,
        })
    }
}
