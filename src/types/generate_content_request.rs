use serde::{Deserialize, Serialize};

use crate::types::{Content, ImageSize};

/// The only aspect ratio the image studio asks for.
pub const SQUARE_ASPECT_RATIO: &str = "1:1";

/// Body of `models/{model}:generateContent` and `:streamGenerateContent`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    /// The conversation, oldest first, ending with the new user message.
    pub contents: Vec<Content>,

    /// Fixed persona for the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,

    /// Sampling, thinking and image options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

/// Generation options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Reasoning budget for thinking models.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<ThinkingConfig>,

    /// Image output options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_config: Option<ImageConfig>,
}

/// Reasoning budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingConfig {
    /// Maximum tokens the model may spend thinking.
    pub thinking_budget: u32,
}

/// Image output options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    /// Aspect ratio such as `1:1`.
    pub aspect_ratio: String,

    /// Output resolution.
    pub image_size: ImageSize,
}

impl GenerateContentRequest {
    /// A request for one streamed text reply.
    pub fn text(
        contents: Vec<Content>,
        system_instruction: Option<&str>,
        thinking_budget: Option<u32>,
    ) -> Self {
        Self {
            contents,
            system_instruction: system_instruction.map(Content::system),
            generation_config: thinking_budget.map(|thinking_budget| GenerationConfig {
                thinking_config: Some(ThinkingConfig { thinking_budget }),
                image_config: None,
            }),
        }
    }

    /// A request for one square image.
    pub fn image(prompt: &str, size: ImageSize) -> Self {
        Self {
            contents: vec![Content::user(prompt)],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                thinking_config: None,
                image_config: Some(ImageConfig {
                    aspect_ratio: SQUARE_ASPECT_RATIO.to_string(),
                    image_size: size,
                }),
            }),
        }
    }
}
