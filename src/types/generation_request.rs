use std::fmt;
use std::pin::Pin;

use futures::Stream;

use crate::error::{Error, Result};
use crate::types::{ConversationTurn, ImagePayload, ImageSize};

/// Single-pass stream of reply fragments, in the order the backend produced
/// them. Concatenating every `Ok` item yields the full reply.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// What a request should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    /// Streamed text.
    Text,
    /// A single image.
    Image,
}

/// A request to the generative backend.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// The new user message; must not be blank.
    pub prompt: String,

    /// Every turn before the pending one, oldest first.
    pub history: Vec<ConversationTurn>,

    /// Text or image.
    pub modality: Modality,

    /// Output resolution; only meaningful for [`Modality::Image`].
    pub image_size: Option<ImageSize>,
}

impl GenerationRequest {
    /// A streamed text request.
    pub fn text(prompt: impl Into<String>, history: Vec<ConversationTurn>) -> Self {
        Self {
            prompt: prompt.into(),
            history,
            modality: Modality::Text,
            image_size: None,
        }
    }

    /// A single-image request.
    pub fn image(prompt: impl Into<String>, size: ImageSize) -> Self {
        Self {
            prompt: prompt.into(),
            history: Vec::new(),
            modality: Modality::Image,
            image_size: Some(size),
        }
    }

    /// Check the request invariants.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(Error::validation(
                "prompt must not be blank",
                Some("prompt".to_string()),
            ));
        }
        if self.modality == Modality::Text && self.image_size.is_some() {
            return Err(Error::validation(
                "image size only applies to image requests",
                Some("image_size".to_string()),
            ));
        }
        Ok(())
    }
}

/// What the backend produced.
pub enum GenerationResult {
    /// Streamed reply fragments.
    Text(FragmentStream),
    /// One image.
    Image(ImagePayload),
}

impl fmt::Debug for GenerationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationResult::Text(_) => f.write_str("GenerationResult::Text(..)"),
            GenerationResult::Image(image) => f
                .debug_tuple("GenerationResult::Image")
                .field(&image.media_type)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_prompt_is_rejected() {
        let err = GenerationRequest::text("   \n", Vec::new())
            .validate()
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn image_size_only_for_images() {
        assert!(
            GenerationRequest::image("a neon city", ImageSize::Large)
                .validate()
                .is_ok()
        );

        let mut request = GenerationRequest::text("hello", Vec::new());
        request.image_size = Some(ImageSize::Small);
        assert!(request.validate().is_err());
    }
}
