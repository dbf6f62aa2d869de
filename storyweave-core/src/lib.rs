//! Illustrated story generation pipeline.
//!
//! This crate turns a text prompt or an uploaded image into an illustrated
//! short story rendered as a styled HTML page:
//! - Generate the story text, split into titled sections
//! - Illustrate each section with an image-generation model, retrying with
//!   rewritten prompts when generation fails
//! - Extract a color palette from each illustration and synthesize one
//!   cohesive page theme
//! - Assemble everything into a single HTML document
//!
//! # Quick Start
//!
//! ```ignore
//! use storyweave_core::{Pipeline, PipelineConfig, StoryContext, StoryRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut pipeline = Pipeline::from_env(PipelineConfig::default())?;
//!
//!     let request = StoryRequest::new(StoryContext::Topic("a lighthouse keeper".into()))
//!         .with_word_count(400);
//!
//!     let story = pipeline.run(&request).await?;
//!     println!("story written to {}", story.document_path.display());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod html;
pub mod image;
pub mod model;
pub mod pipeline;
pub mod story;
pub mod testing;
pub mod theme;

// Primary public API
pub use config::ModelConfig;
pub use image::{GeneratedImage, ImageClient, ImageGenError};
pub use model::{ContentModel, ContentRequest, ImageModel, ImagePayload, ModelError};
pub use pipeline::{ImageRecord, Pipeline, PipelineConfig, PipelineError, RenderedStory};
pub use story::{StoryContext, StoryDraft, StoryGenerator, StoryRequest, StorySection};
pub use theme::{PaletteSample, StoryTheme, ThemeExtractor, ThemeSynthesizer};
