//! Command-line entry point for the illustrated story pipeline.
//!
//! ```bash
//! storyweave --topic "a lighthouse keeper" --words 400
//! storyweave --image photo.jpg --story-theme "Fairy tale"
//! storyweave --context-file notes.txt --story-inspiration "Norse myth"
//! ```

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use storyweave_core::config::{DEFAULT_IMAGE_TO_TEXT_MODEL, DEFAULT_VISION_MODEL};
use storyweave_core::model::{mime_for_path, ImagePayload};
use storyweave_core::{ModelConfig, Pipeline, PipelineConfig, StoryContext, StoryRequest};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "storyweave", version, about = "Generate an illustrated short story as a styled HTML page")]
struct Args {
    /// Topic to write the story about.
    #[arg(long, conflicts_with_all = ["context_file", "image"])]
    topic: Option<String>,

    /// File containing a text passage to use as story context.
    #[arg(long)]
    context_file: Option<PathBuf>,

    /// Image file to base the story on.
    #[arg(long, conflicts_with = "context_file")]
    image: Option<PathBuf>,

    /// Output style of the story.
    #[arg(long, default_value = "General")]
    story_theme: String,

    /// Inspiration the story should draw from.
    #[arg(long, default_value = "General")]
    story_inspiration: String,

    /// Target word count (soft-capped at 2000).
    #[arg(long, default_value_t = 200)]
    words: usize,

    /// Directory that receives generated images and the story document.
    #[arg(long, default_value = "outputs")]
    output_dir: PathBuf,

    /// Text/vision model for story, palette and theme requests.
    #[arg(long, env = "IMAGE_TO_TEXT_MODEL", default_value = DEFAULT_IMAGE_TO_TEXT_MODEL)]
    text_model: String,

    /// Image generation model.
    #[arg(long, env = "VISION_MODEL", default_value = DEFAULT_VISION_MODEL)]
    image_model: String,
}

impl Args {
    fn context(&self) -> anyhow::Result<StoryContext> {
        if let Some(topic) = &self.topic {
            return Ok(StoryContext::Topic(topic.clone()));
        }
        if let Some(path) = &self.image {
            let data = std::fs::read(path)
                .with_context(|| format!("could not read image {}", path.display()))?;
            return Ok(StoryContext::Image(ImagePayload {
                data,
                mime_type: mime_for_path(path).to_string(),
            }));
        }
        if let Some(path) = &self.context_file {
            let passage = std::fs::read_to_string(path)
                .with_context(|| format!("could not read context file {}", path.display()))?;
            return Ok(StoryContext::Passage(passage));
        }
        anyhow::bail!("one of --topic, --context-file or --image is required")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let context = args.context()?;
    tracing::info!(
        text_model = %args.text_model,
        image_model = %args.image_model,
        "models selected"
    );

    let client = gemini::Gemini::from_env()
        .context("GEMINI_API_KEY not set; add it to the environment or a .env file")?;
    let models = ModelConfig::new(&args.text_model, &args.image_model);
    let mut pipeline =
        Pipeline::with_gemini(client, &models, PipelineConfig::new(&args.output_dir));

    let request = StoryRequest::new(context)
        .with_theme(&args.story_theme)
        .with_inspiration(&args.story_inspiration)
        .with_word_count(args.words);

    let story = pipeline.run(&request).await?;

    println!("Story written to {}", story.document_path.display());
    Ok(())
}
