//! Palette extraction and theme synthesis.
//!
//! Extraction asks the vision-capable text model for a four-color
//! palette per illustration and stores the answer as opaque text; it is
//! a prompt contract, not a verified invariant. Validation happens only
//! at synthesis, where all accumulated palettes plus the story's theme
//! hint are turned into one page theme with a bounded retry on
//! malformed output.

use crate::model::{mime_for_path, strip_code_fences, ContentModel, ContentRequest, ModelError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

/// Number of synthesis attempts before giving up.
pub const SYNTHESIS_ATTEMPTS: u32 = 3;

/// Raw palette text extracted from one section illustration.
///
/// The content is untrusted and may be malformed; it is parsed only as
/// part of theme synthesis.
#[derive(Debug, Clone)]
pub struct PaletteSample(String);

impl PaletteSample {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The final page theme, applied uniformly to every section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoryTheme {
    #[serde(rename = "BackgroundColor")]
    pub background_color: String,

    #[serde(rename = "FontColor")]
    pub font_color: String,

    #[serde(rename = "FontFamily")]
    pub font_family: String,
}

/// Why a synthesis response was rejected.
#[derive(Debug, Error)]
pub enum ThemeParseError {
    #[error("not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("field {0} is empty")]
    EmptyField(&'static str),
}

/// Parse a synthesis response into a [`StoryTheme`].
///
/// All three fields must be present and non-empty; anything else is a
/// rejection that triggers a retry.
pub fn parse_theme(text: &str) -> Result<StoryTheme, ThemeParseError> {
    let theme: StoryTheme = serde_json::from_str(strip_code_fences(text))?;
    for (field, value) in [
        ("BackgroundColor", &theme.background_color),
        ("FontColor", &theme.font_color),
        ("FontFamily", &theme.font_family),
    ] {
        if value.trim().is_empty() {
            return Err(ThemeParseError::EmptyField(field));
        }
    }
    Ok(theme)
}

/// Errors from palette extraction.
#[derive(Debug, Error)]
pub enum PaletteError {
    #[error("could not read image {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Extracts a color palette from a rendered illustration.
pub struct ThemeExtractor {
    model: Arc<dyn ContentModel>,
}

impl ThemeExtractor {
    pub fn new(model: Arc<dyn ContentModel>) -> Self {
        Self { model }
    }

    /// Extract a palette from the image at `path`.
    ///
    /// Malformed model output is never an error here; whatever text the
    /// model returns is stored as-is and judged at synthesis.
    pub async fn extract_palette(&self, path: &Path) -> Result<PaletteSample, PaletteError> {
        let data = fs::read(path).await.map_err(|source| PaletteError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let request = ContentRequest::text(include_str!("prompts/palette_extraction.txt"))
            .with_image(data, mime_for_path(path));

        let text = self.model.generate(request).await?;
        info!(path = %path.display(), "palette extracted");
        Ok(PaletteSample::new(text))
    }
}

/// One failed synthesis attempt.
#[derive(Debug, Error)]
pub enum ThemeAttemptError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Parse(#[from] ThemeParseError),
}

/// Errors from theme synthesis.
#[derive(Debug, Error)]
pub enum ThemeSynthesisError {
    #[error("theme synthesis exhausted after {attempts} attempts")]
    Exhausted {
        attempts: u32,
        #[source]
        source: ThemeAttemptError,
    },
}

/// Synthesizes one cohesive [`StoryTheme`] from accumulated palettes.
pub struct ThemeSynthesizer {
    model: Arc<dyn ContentModel>,
}

impl ThemeSynthesizer {
    pub fn new(model: Arc<dyn ContentModel>) -> Self {
        Self { model }
    }

    /// Pick one theme from the palettes and the story's narrative
    /// context. The identical request is reissued up to
    /// [`SYNTHESIS_ATTEMPTS`] times when the response is malformed or
    /// incomplete; there is no default theme fallback.
    pub async fn synthesize(
        &self,
        narrative_context: &str,
        samples: &[PaletteSample],
    ) -> Result<StoryTheme, ThemeSynthesisError> {
        let palette_block = samples
            .iter()
            .map(PaletteSample::as_str)
            .collect::<Vec<_>>()
            .join("\n, ");

        let mut prompt = String::new();
        prompt.push_str(include_str!("prompts/theme_synthesis.txt"));
        prompt.push_str("\nTHEMES_CONTEXT:\n");
        prompt.push_str(narrative_context);
        prompt.push_str("\n\nCOLOR_PALETTE:\n");
        prompt.push_str(&palette_block);

        let mut attempt: u32 = 0;
        let source = loop {
            attempt += 1;
            let failure: ThemeAttemptError = match self
                .model
                .generate(ContentRequest::text(prompt.clone()).json_only())
                .await
            {
                Ok(text) => match parse_theme(&text) {
                    Ok(theme) => {
                        info!(
                            background = %theme.background_color,
                            font = %theme.font_color,
                            family = %theme.font_family,
                            "theme synthesized"
                        );
                        return Ok(theme);
                    }
                    Err(err) => {
                        warn!(attempt, %err, "theme response rejected");
                        err.into()
                    }
                },
                Err(err) => {
                    warn!(attempt, %err, "theme request failed");
                    err.into()
                }
            };
            if attempt >= SYNTHESIS_ATTEMPTS {
                break failure;
            }
        };

        Err(ThemeSynthesisError::Exhausted {
            attempts: attempt,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockContentModel;

    const THEME_JSON: &str =
        r##"{"BackgroundColor": "#111111", "FontColor": "#EEEEEE", "FontFamily": "Georgia"}"##;

    #[test]
    fn test_parse_theme() {
        let theme = parse_theme(THEME_JSON).unwrap();
        assert_eq!(theme.background_color, "#111111");
        assert_eq!(theme.font_color, "#EEEEEE");
        assert_eq!(theme.font_family, "Georgia");
    }

    #[test]
    fn test_parse_theme_accepts_fences() {
        let fenced = format!("```json\n{THEME_JSON}\n```");
        assert!(parse_theme(&fenced).is_ok());
    }

    #[test]
    fn test_parse_theme_rejects_missing_field() {
        let json = r##"{"BackgroundColor": "#111111", "FontColor": "#EEEEEE"}"##;
        assert!(matches!(parse_theme(json), Err(ThemeParseError::Json(_))));
    }

    #[test]
    fn test_parse_theme_rejects_empty_field() {
        let json = r##"{"BackgroundColor": "#111111", "FontColor": "", "FontFamily": "Georgia"}"##;
        match parse_theme(json) {
            Err(ThemeParseError::EmptyField(field)) => assert_eq!(field, "FontColor"),
            other => panic!("expected EmptyField, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_synthesize_first_attempt() {
        let model = Arc::new(MockContentModel::new(vec![Ok(THEME_JSON.to_string())]));
        let synthesizer = ThemeSynthesizer::new(model.clone());

        let samples = [
            PaletteSample::new(r##"{"first": "#000000"}"##),
            PaletteSample::new(r##"{"first": "#333333"}"##),
        ];
        let theme = synthesizer
            .synthesize("a moonlit mystery", &samples)
            .await
            .unwrap();

        assert_eq!(theme.font_family, "Georgia");
        assert_eq!(model.call_count(), 1);

        // All samples appear in the request, in accumulation order.
        let prompt = &model.prompts()[0];
        let first = prompt.find("#000000").unwrap();
        let second = prompt.find("#333333").unwrap();
        assert!(first < second);
        assert!(prompt.contains("a moonlit mystery"));
    }

    #[tokio::test]
    async fn test_synthesize_retries_malformed_then_succeeds() {
        let model = Arc::new(MockContentModel::new(vec![
            Ok("not json".to_string()),
            Ok(r##"{"BackgroundColor": "#111111"}"##.to_string()),
            Ok(THEME_JSON.to_string()),
        ]));
        let synthesizer = ThemeSynthesizer::new(model.clone());

        let theme = synthesizer
            .synthesize("context", &[PaletteSample::new("p")])
            .await
            .unwrap();

        assert_eq!(theme.background_color, "#111111");
        assert_eq!(model.call_count(), 3);

        // Retries reissue the identical request.
        let prompts = model.prompts();
        assert_eq!(prompts[0], prompts[1]);
        assert_eq!(prompts[1], prompts[2]);
    }

    #[tokio::test]
    async fn test_synthesize_exhausts_after_three_attempts() {
        let model = Arc::new(MockContentModel::new(vec![
            Ok("bad".to_string()),
            Ok("bad".to_string()),
            Ok("bad".to_string()),
            Ok(THEME_JSON.to_string()),
        ]));
        let synthesizer = ThemeSynthesizer::new(model.clone());

        match synthesizer.synthesize("context", &[]).await {
            Err(ThemeSynthesisError::Exhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(model.call_count(), 3, "no fourth request is made");
    }

    #[tokio::test]
    async fn test_model_failure_consumes_an_attempt() {
        let model = Arc::new(MockContentModel::new(vec![
            Err(ModelError::Backend("unavailable".to_string())),
            Ok(THEME_JSON.to_string()),
        ]));
        let synthesizer = ThemeSynthesizer::new(model.clone());

        let theme = synthesizer
            .synthesize("context", &[])
            .await
            .unwrap();
        assert_eq!(theme.font_color, "#EEEEEE");
        assert_eq!(model.call_count(), 2);
    }
}
