use serde::{Deserialize, Serialize};

use crate::types::{Content, FinishReason, InlineData, UsageMetadata};

/// A full `generateContent` response, or one chunk of a streamed one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    /// Generated candidates. The advisor only ever reads the first.
    #[serde(default)]
    pub candidates: Vec<Candidate>,

    /// Present when the prompt itself was rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_feedback: Option<PromptFeedback>,

    /// Token accounting; streamed responses repeat it on the last chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,

    /// The model that served the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

/// One generated alternative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// The generated content; absent when the candidate was blocked outright.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,

    /// Set on the final chunk of the candidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

/// Feedback on the prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    /// Why the prompt was blocked, e.g. `SAFETY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Reply text of the first candidate, or an empty string.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(Content::text)
            .unwrap_or_default()
    }

    /// The first inline data part of the first candidate.
    pub fn inline_data(&self) -> Option<&InlineData> {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .and_then(Content::inline_data)
    }

    /// Finish reason of the first candidate.
    pub fn finish_reason(&self) -> Option<&FinishReason> {
        self.candidates
            .first()
            .and_then(|candidate| candidate.finish_reason.as_ref())
    }

    /// Why the backend refused to answer, if it did.
    ///
    /// This covers both a blocked prompt and a candidate cut off by a filter.
    pub fn block_reason(&self) -> Option<String> {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.clone())
        {
            return Some(format!("prompt blocked: {reason}"));
        }
        match self.finish_reason() {
            Some(reason) if reason.is_blocked() => Some(format!("reply blocked: {reason:?}")),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn streamed_chunk() {
        let chunk: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Perda"}]}
            }],
            "modelVersion": "gemini-3-pro-preview"
        }))
        .unwrap();
        assert_eq!(chunk.text(), "Perda");
        assert!(chunk.finish_reason().is_none());
        assert!(chunk.block_reason().is_none());
    }

    #[test]
    fn final_chunk_with_usage() {
        let chunk: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": " é..."}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 9, "candidatesTokenCount": 3, "totalTokenCount": 12}
        }))
        .unwrap();
        assert_eq!(chunk.finish_reason(), Some(&FinishReason::Stop));
        assert_eq!(chunk.usage_metadata.unwrap().total_token_count, 12);
    }

    #[test]
    fn blocked_prompt() {
        let response: GenerateContentResponse =
            serde_json::from_value(json!({"promptFeedback": {"blockReason": "SAFETY"}})).unwrap();
        assert_eq!(response.text(), "");
        assert_eq!(
            response.block_reason().as_deref(),
            Some("prompt blocked: SAFETY")
        );
    }

    #[test]
    fn no_image_parts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "I cannot draw that."}]}}]
        }))
        .unwrap();
        assert!(response.inline_data().is_none());
    }
}
