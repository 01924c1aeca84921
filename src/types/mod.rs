// Public modules
pub mod content;
pub mod conversation_turn;
pub mod finish_reason;
pub mod generate_content_request;
pub mod generate_content_response;
pub mod generation_request;
pub mod image_payload;
pub mod image_size;
pub mod model;
pub mod speaker;
pub mod usage_metadata;

// Re-exports
pub use content::{Content, InlineData, Part};
pub use conversation_turn::ConversationTurn;
pub use finish_reason::FinishReason;
pub use generate_content_request::{
    GenerateContentRequest, GenerationConfig, ImageConfig, SQUARE_ASPECT_RATIO, ThinkingConfig,
};
pub use generate_content_response::{Candidate, GenerateContentResponse, PromptFeedback};
pub use generation_request::{FragmentStream, GenerationRequest, GenerationResult, Modality};
pub use image_payload::{DEFAULT_IMAGE_MEDIA_TYPE, ImagePayload};
pub use image_size::ImageSize;
pub use model::{KnownModel, Model};
pub use speaker::Speaker;
pub use usage_metadata::UsageMetadata;
