use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::Speaker;

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Who wrote the turn.
    pub speaker: Speaker,

    /// The text of the turn.
    ///
    /// Grows while the turn is the pending assistant reply, fixed afterwards.
    pub text: String,

    /// When the turn was appended.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,
}

impl ConversationTurn {
    /// Create a turn stamped with the current time.
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Create a user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Speaker::User, text)
    }

    /// Create an assistant turn.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Speaker::Assistant, text)
    }

    /// Returns true for user turns.
    pub fn is_user(&self) -> bool {
        self.speaker == Speaker::User
    }
}
