use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::InlineData;

/// Media type assumed when the backend does not name one.
pub const DEFAULT_IMAGE_MEDIA_TYPE: &str = "image/png";

/// A generated image, still base64-encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePayload {
    /// Media type such as `image/png`.
    pub media_type: String,

    /// Standard base64 data.
    pub data: String,
}

impl ImagePayload {
    /// Create a payload from already-encoded data.
    pub fn new(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            data: data.into(),
        }
    }

    /// Encode raw image bytes.
    pub fn from_bytes(media_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(media_type, STANDARD.encode(bytes))
    }

    /// `data:<media type>;base64,<data>`, ready for an `<img src>`.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }

    /// Decode the image bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        Ok(STANDARD.decode(self.data.as_bytes())?)
    }

    /// File extension matching the media type.
    pub fn extension(&self) -> &'static str {
        match self.media_type.as_str() {
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }
}

impl From<&InlineData> for ImagePayload {
    fn from(inline: &InlineData) -> Self {
        let media_type = inline
            .mime_type
            .clone()
            .filter(|mime| !mime.is_empty())
            .unwrap_or_else(|| DEFAULT_IMAGE_MEDIA_TYPE.to_string());
        Self::new(media_type, inline.data.clone())
    }
}
