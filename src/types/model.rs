use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Represents a Gemini model identifier.
///
/// This can be a predefined model or a custom string value for models that
/// are newer than this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Model {
    /// Known model versions
    Known(KnownModel),

    /// Custom model identifier
    Custom(String),
}

/// Known Gemini models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KnownModel {
    /// Gemini 3 Pro preview, the advisor's text model.
    #[serde(rename = "gemini-3-pro-preview")]
    Gemini3ProPreview,

    /// Gemini 3 Pro image preview, the NFT studio's image model.
    #[serde(rename = "gemini-3-pro-image-preview")]
    Gemini3ProImagePreview,

    /// Gemini 2.5 Pro
    #[serde(rename = "gemini-2.5-pro")]
    Gemini25Pro,

    /// Gemini 2.5 Flash
    #[serde(rename = "gemini-2.5-flash")]
    Gemini25Flash,
}

impl KnownModel {
    /// All known models, in display order.
    pub const ALL: [KnownModel; 4] = [
        KnownModel::Gemini3ProPreview,
        KnownModel::Gemini3ProImagePreview,
        KnownModel::Gemini25Pro,
        KnownModel::Gemini25Flash,
    ];

    /// The API identifier of this model.
    pub fn as_str(&self) -> &'static str {
        match self {
            KnownModel::Gemini3ProPreview => "gemini-3-pro-preview",
            KnownModel::Gemini3ProImagePreview => "gemini-3-pro-image-preview",
            KnownModel::Gemini25Pro => "gemini-2.5-pro",
            KnownModel::Gemini25Flash => "gemini-2.5-flash",
        }
    }
}

impl Model {
    /// The default model for streamed advisor replies.
    pub fn default_text() -> Self {
        Model::Known(KnownModel::Gemini3ProPreview)
    }

    /// The default model for image generation.
    pub fn default_image() -> Self {
        Model::Known(KnownModel::Gemini3ProImagePreview)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Model::Known(known_model) => write!(f, "{known_model}"),
            Model::Custom(custom) => write!(f, "{custom}"),
        }
    }
}

impl fmt::Display for KnownModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KnownModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KnownModel::ALL
            .into_iter()
            .find(|model| model.as_str() == s)
            .ok_or_else(|| format!("unknown model: {s}"))
    }
}

impl FromStr for Model {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse::<KnownModel>() {
            Ok(known) => Model::Known(known),
            Err(_) => Model::Custom(s.to_string()),
        })
    }
}

impl From<KnownModel> for Model {
    fn from(model: KnownModel) -> Self {
        Model::Known(model)
    }
}

impl From<&str> for Model {
    fn from(model: &str) -> Self {
        match model.parse::<Model>() {
            Ok(model) => model,
            Err(never) => match never {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_model_serialization() {
        let model = Model::Known(KnownModel::Gemini3ProPreview);
        let json = serde_json::to_string(&model).unwrap();
        assert_eq!(json, r#""gemini-3-pro-preview""#);
    }

    #[test]
    fn model_deserialization() {
        let model: Model = serde_json::from_str(r#""gemini-2.5-flash""#).unwrap();
        assert_eq!(model, Model::Known(KnownModel::Gemini25Flash));

        let model: Model = serde_json::from_str(r#""gemini-9-ultra""#).unwrap();
        assert_eq!(model, Model::Custom("gemini-9-ultra".to_string()));
    }

    #[test]
    fn parse_and_display() {
        let model: Model = "gemini-3-pro-image-preview".parse().unwrap();
        assert_eq!(model, Model::default_image());
        assert_eq!(model.to_string(), "gemini-3-pro-image-preview");

        let model = Model::from("my-tuned-model");
        assert_eq!(model.to_string(), "my-tuned-model");
    }
}
