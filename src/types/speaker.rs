use serde::{Deserialize, Serialize};
use std::fmt;

/// Who authored a conversation turn.
///
/// On the wire the assistant is called `model`, which is what Gemini expects
/// in `contents[].role`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Speaker {
    /// The person using the advisor.
    #[serde(rename = "user")]
    User,

    /// The generative backend.
    #[serde(rename = "model")]
    Assistant,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::User => write!(f, "user"),
            Speaker::Assistant => write!(f, "assistant"),
        }
    }
}
