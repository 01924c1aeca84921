//! Configuration types for the advisor.
//!
//! This module provides CLI argument parsing via `arrrg` and the resolved
//! [`AdvisorConfig`] used to build the client.

use std::path::PathBuf;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::client::{DEFAULT_TIMEOUT, Gemini};
use crate::error::Result;
use crate::persona::DEFAULT_THINKING_BUDGET;
use crate::types::Model;

/// Command-line arguments for the nexus-advisor tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct AdvisorArgs {
    /// Model used for streamed replies.
    #[arrrg(optional, "Text model (default: gemini-3-pro-preview)", "MODEL")]
    pub model: Option<String>,

    /// Model used for images.
    #[arrrg(optional, "Image model (default: gemini-3-pro-image-preview)", "MODEL")]
    pub image_model: Option<String>,

    /// Alternate API endpoint.
    #[arrrg(optional, "API base URL", "URL")]
    pub base_url: Option<String>,

    /// Request timeout in seconds.
    #[arrrg(optional, "Request timeout in seconds (default: 120)", "SECONDS")]
    pub timeout_secs: Option<u64>,

    /// Reasoning budget; zero disables thinking.
    #[arrrg(optional, "Thinking budget in tokens, 0 disables (default: 1024)", "TOKENS")]
    pub thinking_budget: Option<u32>,

    /// Directory generated images are written to.
    #[arrrg(optional, "Directory for generated images (default: .)", "DIR")]
    pub image_dir: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Resolved advisor configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvisorConfig {
    /// Model used for streamed replies.
    pub text_model: Model,

    /// Model used for images.
    pub image_model: Model,

    /// Alternate API endpoint; `None` is the public Gemini endpoint.
    pub base_url: Option<String>,

    /// Per-request timeout.
    pub timeout: Duration,

    /// Reasoning budget for replies. `None` disables thinking.
    pub thinking_budget: Option<u32>,

    /// Directory generated images are written to.
    pub image_dir: PathBuf,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl AdvisorConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            text_model: Model::default_text(),
            image_model: Model::default_image(),
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            thinking_budget: Some(DEFAULT_THINKING_BUDGET),
            image_dir: PathBuf::from("."),
            use_color: true,
        }
    }

    /// Sets the text model.
    pub fn with_text_model(mut self, model: Model) -> Self {
        self.text_model = model;
        self
    }

    /// Sets the image model.
    pub fn with_image_model(mut self, model: Model) -> Self {
        self.image_model = model;
        self
    }

    /// Sets the API endpoint.
    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the thinking budget.
    pub fn with_thinking_budget(mut self, budget: Option<u32>) -> Self {
        self.thinking_budget = budget;
        self
    }

    /// Sets the image output directory.
    pub fn with_image_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.image_dir = dir.into();
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Builds a Gemini client for this configuration.
    pub fn client(&self) -> Result<Gemini> {
        Ok(
            Gemini::with_options(self.base_url.clone(), Some(self.timeout))?
                .with_text_model(self.text_model.clone())
                .with_image_model(self.image_model.clone())
                .with_thinking_budget(self.thinking_budget),
        )
    }
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<AdvisorArgs> for AdvisorConfig {
    fn from(args: AdvisorArgs) -> Self {
        let defaults = AdvisorConfig::new();
        AdvisorConfig {
            text_model: args
                .model
                .map(|s| Model::from(s.as_str()))
                .unwrap_or(defaults.text_model),
            image_model: args
                .image_model
                .map(|s| Model::from(s.as_str()))
                .unwrap_or(defaults.image_model),
            base_url: args.base_url,
            timeout: args
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            thinking_budget: match args.thinking_budget {
                Some(0) => None,
                Some(budget) => Some(budget),
                None => defaults.thinking_budget,
            },
            image_dir: args
                .image_dir
                .map(PathBuf::from)
                .unwrap_or(defaults.image_dir),
            use_color: !args.no_color,
        }
    }
}
