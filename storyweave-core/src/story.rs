//! Story data model and the story generation service.
//!
//! A story draft is produced once per pipeline run and is immutable
//! afterwards. Sections carry an ordinal parsed from their id
//! (`part_1`, `part_2`, ...) which fixes both the rendering order and
//! the left/right layout parity.

use crate::model::{ContentModel, ContentRequest, ImagePayload, ModelError};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Soft cap on the requested story length, in words.
pub const MAX_WORDS: usize = 2000;

/// Errors from story generation.
#[derive(Debug, Error)]
pub enum StoryError {
    #[error("story model error: {0}")]
    Model(#[from] ModelError),

    #[error("story response was not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("section id {0:?} does not carry an ordinal")]
    BadSectionId(String),
}

/// A complete generated story, immutable once produced.
#[derive(Debug, Clone)]
pub struct StoryDraft {
    /// Story title.
    pub title: String,

    /// Introduction paragraph shown before the sections.
    pub introduction: String,

    /// One-line description of setting, mood and tone. Feeds theme
    /// synthesis, never shown to the reader.
    pub theme_hint: String,

    sections: Vec<StorySection>,
}

impl StoryDraft {
    /// Sections in reading order.
    pub fn sections(&self) -> &[StorySection] {
        &self.sections
    }
}

/// One titled unit of the story, pairing narrative text with one
/// illustration prompt.
#[derive(Debug, Clone)]
pub struct StorySection {
    /// Ordinal-bearing id, e.g. `part_1`.
    pub id: String,

    /// Ordinal parsed from the id. Determines layout parity.
    pub ordinal: usize,

    /// Narrative text for this section.
    pub narrative: String,

    /// Prompt used to illustrate this section.
    pub image_prompt: String,
}

/// Extract the ordinal from a section id like `part_3`.
pub(crate) fn section_ordinal(id: &str) -> Option<usize> {
    id.rsplit('_').next()?.parse().ok()
}

/// The source material the story is written from. Exactly one of a
/// topic, a text passage, or an uploaded image.
#[derive(Debug, Clone)]
pub enum StoryContext {
    /// A short topic to write about.
    Topic(String),

    /// A longer text passage used as context.
    Passage(String),

    /// An image the story should be based on.
    Image(ImagePayload),
}

/// A request for one story.
#[derive(Debug, Clone)]
pub struct StoryRequest {
    /// Source material for the story.
    pub context: StoryContext,

    /// Output style hint, e.g. "Fairy tale".
    pub theme: String,

    /// Inspiration the story should draw from.
    pub inspiration: String,

    /// Target word count; clamped to [`MAX_WORDS`] before the request.
    pub word_count: usize,
}

impl StoryRequest {
    /// Create a request with default hints and a 200 word target.
    pub fn new(context: StoryContext) -> Self {
        Self {
            context,
            theme: "General".to_string(),
            inspiration: "General".to_string(),
            word_count: 200,
        }
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = theme.into();
        self
    }

    pub fn with_inspiration(mut self, inspiration: impl Into<String>) -> Self {
        self.inspiration = inspiration.into();
        self
    }

    pub fn with_word_count(mut self, word_count: usize) -> Self {
        self.word_count = word_count;
        self
    }
}

/// Generates a [`StoryDraft`] from a [`StoryRequest`].
pub struct StoryGenerator {
    model: Arc<dyn ContentModel>,
}

impl StoryGenerator {
    pub fn new(model: Arc<dyn ContentModel>) -> Self {
        Self { model }
    }

    /// Generate a story draft. A malformed response is fatal for the run.
    pub async fn generate(&self, request: &StoryRequest) -> Result<StoryDraft, StoryError> {
        let words = request.word_count.min(MAX_WORDS);

        let mut prompt = String::new();
        prompt.push_str(include_str!("prompts/story_generation.txt"));
        prompt.push_str("\nINPUT:\n");
        prompt.push_str(&format!("TARGET_WORD_COUNT: {words}\n"));
        prompt.push_str(&format!("STORY_THEME: {}\n", request.theme));
        prompt.push_str(&format!("STORY_INSPIRATION: {}\n", request.inspiration));

        let mut content = match &request.context {
            StoryContext::Topic(topic) => {
                prompt.push_str(&format!("TOPIC: {topic}\n"));
                ContentRequest::text(prompt)
            }
            StoryContext::Passage(passage) => {
                prompt.push_str(&format!("CONTEXT:\n{passage}\n"));
                ContentRequest::text(prompt)
            }
            StoryContext::Image(image) => {
                prompt.push_str(
                    "Use the attached image as the starting point and subject of the story.\n",
                );
                ContentRequest::text(prompt)
                    .with_image(image.data.clone(), image.mime_type.clone())
            }
        };
        content = content.json_only();

        info!(words, theme = %request.theme, "generating story draft");
        let response = self.model.generate(content).await?;
        let draft = parse_draft(&response)?;
        info!(
            title = %draft.title,
            sections = draft.sections().len(),
            "story draft parsed"
        );
        Ok(draft)
    }
}

#[derive(Debug, Deserialize)]
struct RawDraft {
    title: String,
    introduction: String,
    #[serde(default)]
    theme: String,
    story: HashMap<String, RawSection>,
}

#[derive(Debug, Deserialize)]
struct RawSection {
    story: String,
    image_prompt: String,
}

fn parse_draft(text: &str) -> Result<StoryDraft, StoryError> {
    let raw: RawDraft = serde_json::from_str(crate::model::strip_code_fences(text))?;

    let mut sections = Vec::with_capacity(raw.story.len());
    for (id, section) in raw.story {
        let ordinal = section_ordinal(&id).ok_or_else(|| StoryError::BadSectionId(id.clone()))?;
        sections.push(StorySection {
            id,
            ordinal,
            narrative: section.story,
            image_prompt: section.image_prompt,
        });
    }
    sections.sort_by_key(|section| section.ordinal);

    Ok(StoryDraft {
        title: raw.title,
        introduction: raw.introduction,
        theme_hint: raw.theme,
        sections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockContentModel;

    const DRAFT_JSON: &str = r#"{
        "title": "The Lantern Keeper",
        "introduction": "On a rocky island...",
        "theme": "a quiet, moonlit mystery by the sea",
        "story": {
            "part_2": {"story": "Second beat.", "image_prompt": "A storm gathers."},
            "part_1": {"story": "First beat.", "image_prompt": "A lighthouse at dusk."},
            "part_10": {"story": "Last beat.", "image_prompt": "Calm morning water."}
        }
    }"#;

    #[test]
    fn test_section_ordinal() {
        assert_eq!(section_ordinal("part_1"), Some(1));
        assert_eq!(section_ordinal("part_12"), Some(12));
        assert_eq!(section_ordinal("7"), Some(7));
        assert_eq!(section_ordinal("part_one"), None);
        assert_eq!(section_ordinal("part_"), None);
    }

    #[test]
    fn test_parse_draft_orders_sections_numerically() {
        let draft = parse_draft(DRAFT_JSON).unwrap();
        assert_eq!(draft.title, "The Lantern Keeper");
        assert_eq!(draft.theme_hint, "a quiet, moonlit mystery by the sea");

        let ids: Vec<&str> = draft
            .sections()
            .iter()
            .map(|section| section.id.as_str())
            .collect();
        assert_eq!(ids, vec!["part_1", "part_2", "part_10"]);
        assert_eq!(draft.sections()[0].ordinal, 1);
        assert_eq!(draft.sections()[2].ordinal, 10);
    }

    #[test]
    fn test_parse_draft_rejects_bad_section_id() {
        let json = r#"{
            "title": "T", "introduction": "I", "theme": "",
            "story": {"prologue": {"story": "s", "image_prompt": "p"}}
        }"#;
        match parse_draft(json) {
            Err(StoryError::BadSectionId(id)) => assert_eq!(id, "prologue"),
            other => panic!("expected BadSectionId, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_draft_rejects_malformed_json() {
        assert!(matches!(
            parse_draft("not json at all"),
            Err(StoryError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_accepts_fenced_json() {
        let model = Arc::new(MockContentModel::new(vec![Ok(format!(
            "```json\n{DRAFT_JSON}\n```"
        ))]));
        let generator = StoryGenerator::new(model.clone());

        let request = StoryRequest::new(StoryContext::Topic("a lighthouse".into()))
            .with_theme("Mystery")
            .with_inspiration("Folk tales");
        let draft = generator.generate(&request).await.unwrap();

        assert_eq!(draft.sections().len(), 3);

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("TOPIC: a lighthouse"));
        assert!(prompts[0].contains("STORY_THEME: Mystery"));
        assert!(prompts[0].contains("STORY_INSPIRATION: Folk tales"));
    }

    #[tokio::test]
    async fn test_generate_clamps_word_count() {
        let model = Arc::new(MockContentModel::new(vec![Ok(DRAFT_JSON.to_string())]));
        let generator = StoryGenerator::new(model.clone());

        let request =
            StoryRequest::new(StoryContext::Topic("t".into())).with_word_count(5000);
        generator.generate(&request).await.unwrap();

        assert!(model.prompts()[0].contains("TARGET_WORD_COUNT: 2000"));
    }

    #[tokio::test]
    async fn test_generate_attaches_image_context() {
        let model = Arc::new(MockContentModel::new(vec![Ok(DRAFT_JSON.to_string())]));
        let generator = StoryGenerator::new(model.clone());

        let request = StoryRequest::new(StoryContext::Image(ImagePayload {
            data: vec![1, 2, 3],
            mime_type: "image/jpeg".to_string(),
        }));
        generator.generate(&request).await.unwrap();

        let requests = model.requests();
        let image = requests[0].image.as_ref().expect("image forwarded");
        assert_eq!(image.mime_type, "image/jpeg");
        assert!(requests[0].json_only);
    }
}
