use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output resolution for generated images.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageSize {
    /// Roughly 1024 pixels on a side.
    #[default]
    #[serde(rename = "1K")]
    Small,

    /// Roughly 2048 pixels on a side.
    #[serde(rename = "2K")]
    Medium,

    /// Roughly 4096 pixels on a side.
    #[serde(rename = "4K")]
    Large,
}

impl ImageSize {
    /// The value sent as `imageConfig.imageSize`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::Small => "1K",
            ImageSize::Medium => "2K",
            ImageSize::Large => "4K",
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "1k" | "small" => Ok(ImageSize::Small),
            "2k" | "medium" => Ok(ImageSize::Medium),
            "4k" | "large" => Ok(ImageSize::Large),
            _ => Err(format!("unknown image size {s:?}; expected 1K, 2K or 4K")),
        }
    }
}
