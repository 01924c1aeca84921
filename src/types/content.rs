use serde::{Deserialize, Serialize};

use crate::types::{ConversationTurn, Speaker};

/// A multi-part message as exchanged with the Gemini API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    /// `user` or `model`. Omitted for system instructions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Speaker>,

    /// The ordered parts of the message.
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// One part of a [`Content`]: text, inline binary data, or both absent for
/// part types this crate does not model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// Text content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Inline base64 data, e.g. a generated image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,

    /// Set on parts that carry model reasoning rather than reply text.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub thought: bool,
}

/// Base64 payload with its media type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// Media type such as `image/png`.
    #[serde(default)]
    pub mime_type: Option<String>,

    /// Standard base64 data.
    pub data: String,
}

impl Part {
    /// A text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

impl Content {
    /// A single-text content with the given role.
    pub fn new(role: Speaker, text: impl Into<String>) -> Self {
        Self {
            role: Some(role),
            parts: vec![Part::text(text)],
        }
    }

    /// A user content.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Speaker::User, text)
    }

    /// A role-less content, the shape used for `systemInstruction`.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
        }
    }

    /// Concatenated reply text, skipping thought parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter(|part| !part.thought)
            .filter_map(|part| part.text.as_deref())
            .collect()
    }

    /// The first inline data part that is not a thought, if any.
    pub fn inline_data(&self) -> Option<&InlineData> {
        self.parts
            .iter()
            .filter(|part| !part.thought)
            .find_map(|part| part.inline_data.as_ref())
    }
}

impl From<&ConversationTurn> for Content {
    fn from(turn: &ConversationTurn) -> Self {
        Content::new(turn.speaker, turn.text.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn content_serialization() {
        let content = Content::user("Hello");
        assert_eq!(
            to_value(&content).unwrap(),
            json!({"role": "user", "parts": [{"text": "Hello"}]})
        );
        assert_eq!(
            to_value(Content::system("Be brief")).unwrap(),
            json!({"parts": [{"text": "Be brief"}]})
        );
    }

    #[test]
    fn inline_data_deserialization() {
        let content: Content = serde_json::from_value(json!({
            "role": "model",
            "parts": [
                {"text": "Here you go"},
                {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}}
            ]
        }))
        .unwrap();
        let data = content.inline_data().unwrap();
        assert_eq!(data.mime_type.as_deref(), Some("image/png"));
        assert_eq!(data.data, "iVBORw0KGgo=");
        assert_eq!(content.text(), "Here you go");
    }

    #[test]
    fn text_skips_thoughts() {
        let content: Content = serde_json::from_value(json!({
            "role": "model",
            "parts": [
                {"text": "weighing the options", "thought": true},
                {"text": "Perda"},
                {"text": " impermanente"}
            ]
        }))
        .unwrap();
        assert_eq!(content.text(), "Perda impermanente");
    }

    #[test]
    fn inline_data_skips_thought_drafts() {
        let content: Content = serde_json::from_value(json!({
            "role": "model",
            "parts": [
                {"inlineData": {"mimeType": "image/png", "data": "ZHJhZnQ="}, "thought": true},
                {"inlineData": {"mimeType": "image/jpeg", "data": "ZmluYWw="}}
            ]
        }))
        .unwrap();
        let data = content.inline_data().unwrap();
        assert_eq!(data.mime_type.as_deref(), Some("image/jpeg"));
        assert_eq!(data.data, "ZmluYWw=");

        let drafts_only: Content = serde_json::from_value(json!({
            "parts": [{"inlineData": {"data": "ZHJhZnQ="}, "thought": true}]
        }))
        .unwrap();
        assert!(drafts_only.inline_data().is_none());
    }
}
