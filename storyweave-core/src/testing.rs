//! Testing utilities for the story pipeline.
//!
//! Scripted mock model backends for deterministic tests without API
//! calls. Both mocks record every request they receive so tests can
//! assert attempt counts and prompt contents.

use crate::model::{ContentModel, ContentRequest, ImageArtifact, ImageModel, ModelError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A [`ContentModel`] that returns scripted responses in order.
///
/// Once the script is exhausted every further call fails, mirroring a
/// backend outage.
pub struct MockContentModel {
    responses: Mutex<VecDeque<Result<String, ModelError>>>,
    requests: Mutex<Vec<ContentRequest>>,
}

impl MockContentModel {
    /// Create a mock with scripted responses.
    pub fn new(responses: Vec<Result<String, ModelError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Append a response to the script.
    pub fn queue(&self, response: Result<String, ModelError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ContentRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// The prompt text of every request received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|request| request.prompt.clone())
            .collect()
    }

    /// How many times the model has been called.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ContentModel for MockContentModel {
    async fn generate(&self, request: ContentRequest) -> Result<String, ModelError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::Backend("no scripted response left".to_string())))
    }
}

/// An [`ImageModel`] that returns scripted render results in order.
pub struct MockImageModel {
    responses: Mutex<VecDeque<Result<ImageArtifact, ModelError>>>,
    prompts: Mutex<Vec<String>>,
}

impl MockImageModel {
    /// Create a mock with scripted render results.
    pub fn new(responses: Vec<Result<ImageArtifact, ModelError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Append a render result to the script.
    pub fn queue(&self, response: Result<ImageArtifact, ModelError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// The prompt of every render call so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// How many times the model has been called.
    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ImageModel for MockImageModel {
    async fn render(&self, prompt: &str) -> Result<ImageArtifact, ModelError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::Backend("no scripted response left".to_string())))
    }
}

/// A tiny valid-enough PNG artifact for tests.
pub fn png_artifact() -> ImageArtifact {
    ImageArtifact {
        data: vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A],
        mime_type: "image/png".to_string(),
    }
}

/// A scripted render failure.
pub fn failing_render() -> Result<ImageArtifact, ModelError> {
    Err(ModelError::Backend("image model unavailable".to_string()))
}
