//! Configuration types for article extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`].

use crate::error::NewsclipError;
use crate::pipeline::analyze::ArticleExtractor;
use crate::prompts::Subject;
use std::fmt;
use std::sync::Arc;

/// Default Gemini model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default Gemini API root.
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Folder label written into every result when none is configured.
pub const DEFAULT_FOLDER_NAME: &str = "Uploaded Articles";

/// Environment variables searched, in order, for the Gemini API key.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Configuration for one extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use newsclip::{ExtractionConfig, Subject};
///
/// let config = ExtractionConfig::builder()
///     .model("gemini-2.5-flash")
///     .subject(Subject::new("Joseph Beuys"))
///     .folder_name("Archive box 12")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Model identifier. If None, [`DEFAULT_MODEL`] for Gemini, or
    /// the provider default for other backends.
    pub model: Option<String>,

    /// Backend name. `None` or `"gemini"` selects the native Gemini client;
    /// anything else (e.g. "openai", "anthropic", "ollama") is created via
    /// `edgequake_llm::ProviderFactory`.
    pub provider_name: Option<String>,

    /// Pre-constructed extractor. Takes precedence over `provider_name`.
    pub extractor: Option<Arc<dyn ArticleExtractor>>,

    /// Gemini API key. If None, read from [`API_KEY_ENV_VARS`].
    pub api_key: Option<String>,

    /// Gemini API root, without trailing slash.
    pub api_base_url: String,

    /// Who the articles must mention.
    pub subject: Subject,

    /// Constant written into every result's `folderName`.
    pub folder_name: String,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Transcription wants the model faithful to the page, not creative.
    pub temperature: f32,

    /// Maximum output tokens per image. Default: 8192.
    ///
    /// A full broadsheet article easily exceeds 2 000 tokens; truncation
    /// would cut the JSON mid-string and turn into a schema failure.
    pub max_tokens: usize,

    /// Custom instruction. If None, built from `subject`.
    pub system_prompt: Option<String>,

    /// Run the deterministic paragraph reflow over the model's text. Default: true.
    pub reflow: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            extractor: None,
            api_key: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            subject: Subject::default(),
            folder_name: DEFAULT_FOLDER_NAME.to_string(),
            temperature: 0.1,
            max_tokens: 8192,
            system_prompt: None,
            reflow: true,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field(
                "extractor",
                &self.extractor.as_ref().map(|e| e.name().to_string()),
            )
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base_url", &self.api_base_url)
            .field("subject", &self.subject)
            .field("folder_name", &self.folder_name)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .field("reflow", &self.reflow)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// `true` when the native Gemini client should be used.
    pub fn uses_gemini(&self) -> bool {
        match self.provider_name.as_deref() {
            None => true,
            Some(name) => name.eq_ignore_ascii_case("gemini"),
        }
    }

    /// Model to request, falling back to [`DEFAULT_MODEL`].
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// Default CSV export file name, e.g. `nam_june_paik_articles.csv`.
    pub fn export_file_name(&self) -> String {
        format!("{}_articles.csv", self.subject.slug())
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl fmt::Debug for ExtractionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExtractionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn ArticleExtractor>) -> Self {
        self.config.extractor = Some(extractor);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn subject(mut self, subject: Subject) -> Self {
        self.config.subject = subject;
        self
    }

    pub fn folder_name(mut self, name: impl Into<String>) -> Self {
        self.config.folder_name = name.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn reflow(mut self, v: bool) -> Self {
        self.config.reflow = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, NewsclipError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(NewsclipError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.subject.name.trim().is_empty() {
            return Err(NewsclipError::InvalidConfig(
                "subject name must not be empty".into(),
            ));
        }
        if !(c.api_base_url.starts_with("http://") || c.api_base_url.starts_with("https://")) {
            return Err(NewsclipError::InvalidConfig(format!(
                "API base URL must be http(s), got '{}'",
                c.api_base_url
            )));
        }
        Ok(self.config)
    }
}
