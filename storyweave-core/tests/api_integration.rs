//! Integration tests that call the real Gemini API.
//!
//! These tests require GEMINI_API_KEY to be set (via .env file or
//! environment). Run with:
//! `cargo test -p storyweave-core --test api_integration -- --ignored`
//!
//! They are marked #[ignore] by default to avoid API costs in CI, test
//! failures when no key is available, and slow test runs.

use std::sync::Arc;

use storyweave_core::model::GeminiContentModel;
use storyweave_core::{
    ModelConfig, Pipeline, PipelineConfig, StoryContext, StoryGenerator, StoryRequest,
};

/// Load environment variables from .env file
fn setup() {
    let _ = dotenvy::dotenv();
}

/// Check if API key is available
fn has_api_key() -> bool {
    std::env::var("GEMINI_API_KEY").is_ok()
}

#[tokio::test]
#[ignore] // Run with: cargo test -p storyweave-core --test api_integration -- --ignored
async fn test_story_draft_has_ordered_sections() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: GEMINI_API_KEY not set");
        return;
    }

    let client = gemini::Gemini::from_env().expect("client");
    let models = ModelConfig::default();
    let model = Arc::new(GeminiContentModel::new(
        client,
        models.image_to_text_model.as_str(),
    ));
    let generator = StoryGenerator::new(model);

    let request = StoryRequest::new(StoryContext::Topic(
        "a fox who learns to fish".to_string(),
    ))
    .with_word_count(150);

    let draft = generator.generate(&request).await.expect("draft");

    assert!(!draft.title.is_empty());
    assert!(!draft.introduction.is_empty());
    assert!(draft.sections().len() >= 2);
    for (index, section) in draft.sections().iter().enumerate() {
        if index > 0 {
            assert!(section.ordinal > draft.sections()[index - 1].ordinal);
        }
        assert!(!section.narrative.is_empty());
        assert!(!section.image_prompt.is_empty());
    }
}

#[tokio::test]
#[ignore] // Generates images; slow and costs API credits.
async fn test_full_pipeline_produces_document() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: GEMINI_API_KEY not set");
        return;
    }

    let out = tempfile::tempdir().expect("tempdir");
    let mut pipeline =
        Pipeline::from_env(PipelineConfig::new(out.path())).expect("pipeline");

    let request = StoryRequest::new(StoryContext::Topic(
        "a lighthouse keeper and a storm".to_string(),
    ))
    .with_word_count(120);

    let story = pipeline.run(&request).await.expect("run");

    assert!(story.document_path.exists());
    assert!(!story.images.is_empty());
    assert!(story.html.contains("<h1>"));
}
