use serde::{Deserialize, Serialize};

/// Token accounting reported with a response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    /// Tokens in the prompt, history included.
    #[serde(default)]
    pub prompt_token_count: u32,

    /// Tokens in the reply.
    #[serde(default)]
    pub candidates_token_count: u32,

    /// Tokens spent on reasoning.
    #[serde(default)]
    pub thoughts_token_count: u32,

    /// Everything billed for the request.
    #[serde(default)]
    pub total_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_deserialization() {
        let usage: UsageMetadata =
            serde_json::from_value(json!({"promptTokenCount": 12, "totalTokenCount": 40}))
                .unwrap();
        assert_eq!(usage.prompt_token_count, 12);
        assert_eq!(usage.candidates_token_count, 0);
        assert_eq!(usage.total_token_count, 40);
    }
}
