use serde::{Deserialize, Serialize};

/// Why a candidate stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinishReason {
    /// Natural stop point.
    Stop,

    /// Hit the output token limit.
    MaxTokens,

    /// Blocked by safety filters.
    Safety,

    /// Flagged as recitation.
    Recitation,

    /// Blocked for containing forbidden terms.
    Blocklist,

    /// Blocked as prohibited content.
    ProhibitedContent,

    /// Image output blocked by safety filters.
    ImageSafety,

    /// Any other reason, including ones newer than this crate.
    #[serde(other)]
    Other,
}

impl FinishReason {
    /// Returns true when the candidate was cut off by a content filter.
    pub fn is_blocked(&self) -> bool {
        matches!(
            self,
            FinishReason::Safety
                | FinishReason::Recitation
                | FinishReason::Blocklist
                | FinishReason::ProhibitedContent
                | FinishReason::ImageSafety
        )
    }
}
