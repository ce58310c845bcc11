//! Model interaction: send one encoded image, get back `{title, text}`.
//!
//! All prompt wording lives in [`crate::prompts`]; this file only builds
//! requests, sends them, and holds the replies to the `{title, text}`
//! contract.
//!
//! ## Backends
//!
//! * [`GeminiExtractor`] (default) calls `generateContent` directly so it can
//!   pass the native `responseSchema` constraint.
//! * [`LlmExtractor`] covers every other vision provider through
//!   `edgequake-llm`; the schema is restated in the prompt instead.
//!
//! Both are one request per call: no retry, no timeout, no cache. Identical
//! images submitted twice are analysed twice.

use crate::config::{ExtractionConfig, API_KEY_ENV_VARS};
use crate::error::{AnalysisFailure, NewsclipError};
use crate::output::Article;
use crate::pipeline::encode::EncodedImage;
use crate::pipeline::postprocess::strip_code_fences;
use crate::prompts::{extraction_prompt, inline_schema_suffix, response_schema};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Anything that can turn one page image into an [`Article`].
///
/// Uses `async_trait` because the batch holds extractors as
/// `Arc<dyn ArticleExtractor>` and shares them across spawned tasks.
#[async_trait]
pub trait ArticleExtractor: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Analyse one image. Exactly one outbound request per call.
    async fn extract(&self, image: &EncodedImage) -> Result<Article, AnalysisFailure>;
}

/// Resolve the extractor, from most-specific to least-specific.
///
/// 1. **Pre-built extractor** (`config.extractor`): used as-is. This is how
///    tests and embedding applications plug in their own backend.
/// 2. **Named non-Gemini provider** (`config.provider_name`): created through
///    [`ProviderFactory::create_llm_provider`], which reads that provider's
///    own API key variable.
/// 3. **Gemini**: needs an API key from `config.api_key`, `GEMINI_API_KEY`
///    or `API_KEY`. Without one this fails with
///    [`NewsclipError::MissingCredential`]; the CLI treats that as fatal
///    at startup.
pub fn resolve_extractor(
    config: &ExtractionConfig,
) -> Result<Arc<dyn ArticleExtractor>, NewsclipError> {
    if let Some(ref extractor) = config.extractor {
        return Ok(Arc::clone(extractor));
    }

    let prompt = config
        .system_prompt
        .clone()
        .unwrap_or_else(|| extraction_prompt(&config.subject));

    if !config.uses_gemini() {
        let name = config.provider_name.as_deref().unwrap_or_default();
        let model = config
            .model
            .as_deref()
            .unwrap_or_else(|| default_model_for(name));
        let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
            NewsclipError::ProviderNotConfigured {
                provider: name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        debug!("Using {} / {} via edgequake-llm", name, model);
        return Ok(Arc::new(LlmExtractor::new(
            name,
            provider,
            prompt,
            config.temperature,
            config.max_tokens,
        )));
    }

    let api_key = config
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(api_key_from_env)
        .ok_or_else(|| NewsclipError::MissingCredential {
            var: API_KEY_ENV_VARS[0].to_string(),
        })?;

    Ok(Arc::new(GeminiExtractor::new(
        api_key,
        config.api_base_url.clone(),
        config.model_or_default(),
        prompt,
        config.temperature,
        config.max_tokens,
    )))
}

fn api_key_from_env() -> Option<String> {
    API_KEY_ENV_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|k| !k.trim().is_empty())
}

/// Vision-capable default model per edgequake-llm provider.
fn default_model_for(provider: &str) -> &'static str {
    match provider.to_ascii_lowercase().as_str() {
        "anthropic" => "claude-sonnet-4-20250514",
        "ollama" | "lmstudio" => "llava",
        "mistral" => "pixtral-12b-2409",
        _ => "gpt-4.1-nano",
    }
}

/// Parse a model reply into an [`Article`].
///
/// Tolerates a ```json fence around the object. Anything else that is not a
/// JSON object with string `title` and `text` is a schema failure.
pub fn parse_article_json(raw: &str) -> Result<Article, AnalysisFailure> {
    let body = strip_code_fences(raw);
    if body.is_empty() {
        return Err(AnalysisFailure::Schema("empty response body".into()));
    }
    serde_json::from_str::<Article>(&body).map_err(|e| {
        let preview: String = body.chars().take(80).collect();
        AnalysisFailure::Schema(format!("{e} (body starts: {preview:?})"))
    })
}

// ── Gemini ───────────────────────────────────────────────────────────────────

/// Native Gemini `generateContent` client with structured output.
pub struct GeminiExtractor {
    api_key: String,
    base_url: String,
    model: String,
    prompt: String,
    temperature: f32,
    max_tokens: usize,
    client: reqwest::Client,
}

impl GeminiExtractor {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        prompt: impl Into<String>,
        temperature: f32,
        max_tokens: usize,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            prompt: prompt.into(),
            temperature,
            max_tokens,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn build_request<'a>(&'a self, image: &'a EncodedImage) -> GenerateContentRequest<'a> {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::Text { text: &self.prompt },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: &image.mime_type,
                            data: &image.data,
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: response_schema(),
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
            },
        }
    }
}

// --- Request types ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
    temperature: f32,
    max_output_tokens: usize,
}

// --- Response types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}

/// Pull the article out of a decoded `generateContent` reply.
fn article_from_response(resp: GenerateContentResponse) -> Result<Article, AnalysisFailure> {
    if let Some(reason) = resp.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(AnalysisFailure::Transport(format!(
            "request blocked: {reason}"
        )));
    }

    let candidate = resp
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AnalysisFailure::Schema("response has no candidates".into()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".into());
        return Err(AnalysisFailure::Schema(format!(
            "candidate has no text (finish reason: {reason})"
        )));
    }

    parse_article_json(&text)
}

#[async_trait]
impl ArticleExtractor for GeminiExtractor {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn extract(&self, image: &EncodedImage) -> Result<Article, AnalysisFailure> {
        let start = Instant::now();
        let body = self.build_request(image);

        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisFailure::Transport(format!("Gemini request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AnalysisFailure::Transport(format!(
                "Gemini HTTP {status}: {text}"
            )));
        }

        let raw = resp
            .text()
            .await
            .map_err(|e| AnalysisFailure::Transport(format!("reading Gemini body: {e}")))?;
        let decoded: GenerateContentResponse = serde_json::from_str(&raw)
            .map_err(|e| AnalysisFailure::Schema(format!("Gemini envelope: {e}")))?;

        if let Some(ref usage) = decoded.usage_metadata {
            debug!(
                "{}: {} input tokens, {} output tokens, {:?}",
                image.file_name,
                usage.prompt_token_count.unwrap_or(0),
                usage.candidates_token_count.unwrap_or(0),
                start.elapsed()
            );
        }

        article_from_response(decoded)
    }
}

// ── edgequake-llm ────────────────────────────────────────────────────────────

/// Text sent alongside the image; some OpenAI-compatible servers reject an
/// empty text part.
const USER_TURN_TEXT: &str = "Analyze this newspaper page.";

/// Any `edgequake-llm` vision provider, prompted to reply in JSON.
pub struct LlmExtractor {
    name: String,
    provider: Arc<dyn LLMProvider>,
    prompt: String,
    temperature: f32,
    max_tokens: usize,
}

impl LlmExtractor {
    pub fn new(
        name: impl Into<String>,
        provider: Arc<dyn LLMProvider>,
        prompt: impl Into<String>,
        temperature: f32,
        max_tokens: usize,
    ) -> Self {
        let mut prompt = prompt.into();
        prompt.push_str(&inline_schema_suffix());
        Self {
            name: name.into(),
            provider,
            prompt,
            temperature,
            max_tokens,
        }
    }

    fn build_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ArticleExtractor for LlmExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn extract(&self, image: &EncodedImage) -> Result<Article, AnalysisFailure> {
        let start = Instant::now();
        let messages = vec![
            ChatMessage::system(self.prompt.as_str()),
            ChatMessage::user_with_images(USER_TURN_TEXT, vec![image.to_image_data()]),
        ];
        let options = self.build_options();

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| AnalysisFailure::Transport(format!("{}: {e}", self.name)))?;

        debug!(
            "{}: {} input tokens, {} output tokens, {:?}",
            image.file_name,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        parse_article_json(&response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_image() -> EncodedImage {
        EncodedImage {
            file_name: "front_page.jpg".into(),
            data: "QUJD".into(),
            mime_type: "image/jpeg".into(),
        }
    }

    fn gemini() -> GeminiExtractor {
        GeminiExtractor::new("k", "https://example.test/", "gemini-2.5-flash", "PROMPT", 0.1, 8192)
    }

    /// Serve `responses` one connection at a time on a local port and return
    /// the base URL. Each request is read in full before replying.
    async fn serve(responses: Vec<(u16, &'static str)>) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut sock, _) = listener.accept().await.unwrap();
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                loop {
                    let n = sock.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    let text = String::from_utf8_lossy(&buf);
                    if let Some(end) = text.find("\r\n\r\n") {
                        let len = text[..end]
                            .lines()
                            .find_map(|l| {
                                let (k, v) = l.split_once(':')?;
                                k.eq_ignore_ascii_case("content-length")
                                    .then(|| v.trim().parse::<usize>().ok())
                                    .flatten()
                            })
                            .unwrap_or(0);
                        if buf.len() >= end + 4 + len {
                            break;
                        }
                    }
                }
                let reply = format!(
                    "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                sock.write_all(reply.as_bytes()).await.unwrap();
                sock.shutdown().await.ok();
            }
        });
        format!("http://{addr}")
    }

    fn gemini_at(base_url: &str) -> GeminiExtractor {
        GeminiExtractor::new("k", base_url, "gemini-2.5-flash", "PROMPT", 0.1, 8192)
    }

    #[tokio::test]
    async fn http_error_status_is_transport_failure() {
        let base = serve(vec![(500, r#"{"error":"boom"}"#)]).await;
        let err = gemini_at(&base).extract(&sample_image()).await.unwrap_err();
        match err {
            AnalysisFailure::Transport(detail) => assert!(detail.contains("500"), "{detail}"),
            other => panic!("expected transport failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_json_envelope_is_schema_failure() {
        let base = serve(vec![(200, "not json")]).await;
        let err = gemini_at(&base).extract(&sample_image()).await.unwrap_err();
        assert!(matches!(err, AnalysisFailure::Schema(_)), "{err:?}");
    }

    #[tokio::test]
    async fn valid_envelope_yields_article() {
        let base = serve(vec![(
            200,
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"title\":\"A\",\"text\":\"B\"}"}]},"finishReason":"STOP"}]}"#,
        )])
        .await;
        let article = gemini_at(&base).extract(&sample_image()).await.unwrap();
        assert_eq!(
            article,
            Article {
                title: "A".into(),
                text: "B".into()
            }
        );
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_failure() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = gemini_at(&format!("http://{addr}"))
            .extract(&sample_image())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisFailure::Transport(_)));
    }

    #[test]
    fn endpoint_includes_model() {
        assert_eq!(
            gemini().endpoint(),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn request_has_prompt_image_and_schema() {
        let g = gemini();
        let image = sample_image();
        let body = serde_json::to_value(g.build_request(&image)).unwrap();

        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "PROMPT");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[1]["inlineData"]["data"], "QUJD");

        let generation = &body["generationConfig"];
        assert_eq!(generation["responseMimeType"], "application/json");
        assert_eq!(generation["responseSchema"], response_schema());
        assert_eq!(generation["maxOutputTokens"], 8192);
    }

    #[test]
    fn parses_plain_and_fenced_json() {
        let a = parse_article_json(r#"{"title":"Video Art","text":"Body."}"#).unwrap();
        assert_eq!(a.title, "Video Art");
        assert_eq!(a.text, "Body.");

        let a = parse_article_json("```json\n{\"title\":\"T\",\"text\":\"x\"}\n```").unwrap();
        assert_eq!(a.title, "T");
    }

    #[test]
    fn non_json_is_schema_failure() {
        let err = parse_article_json("Sorry, I cannot read this image.").unwrap_err();
        assert!(matches!(err, AnalysisFailure::Schema(_)));
    }

    #[test]
    fn missing_field_is_schema_failure() {
        let err = parse_article_json(r#"{"title":"only a title"}"#).unwrap_err();
        assert!(matches!(err, AnalysisFailure::Schema(_)));
        let err = parse_article_json("").unwrap_err();
        assert!(matches!(err, AnalysisFailure::Schema(_)));
    }

    #[test]
    fn response_text_parts_are_joined() {
        let resp: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "{\"title\":\"Paik\"," },
                    { "text": "\"text\":\"TV Garden\"}" }
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 1200, "candidatesTokenCount": 300 }
        }))
        .unwrap();
        let a = article_from_response(resp).unwrap();
        assert_eq!(a.title, "Paik");
        assert_eq!(a.text, "TV Garden");
    }

    #[test]
    fn blocked_prompt_is_transport_failure() {
        let resp: GenerateContentResponse = serde_json::from_value(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        }))
        .unwrap();
        let err = article_from_response(resp).unwrap_err();
        assert_eq!(err, AnalysisFailure::Transport("request blocked: SAFETY".into()));
    }

    #[test]
    fn empty_candidates_is_schema_failure() {
        let resp: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(
            article_from_response(resp),
            Err(AnalysisFailure::Schema(_))
        ));

        let resp: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "finishReason": "MAX_TOKENS" }]
        }))
        .unwrap();
        let err = article_from_response(resp).unwrap_err();
        assert!(err.to_string().contains("MAX_TOKENS"));
    }

    #[test]
    fn prebuilt_extractor_wins() {
        struct Fixed;
        #[async_trait]
        impl ArticleExtractor for Fixed {
            fn name(&self) -> &str {
                "fixed"
            }
            async fn extract(&self, _: &EncodedImage) -> Result<Article, AnalysisFailure> {
                Ok(Article::not_found())
            }
        }
        let config = ExtractionConfig::builder()
            .extractor(Arc::new(Fixed))
            .build()
            .unwrap();
        assert_eq!(resolve_extractor(&config).unwrap().name(), "fixed");
    }

    #[test]
    fn explicit_api_key_builds_gemini() {
        let config = ExtractionConfig::builder().api_key("abc").build().unwrap();
        assert_eq!(resolve_extractor(&config).unwrap().name(), "gemini");
    }

    #[test]
    fn user_turn_carries_text() {
        assert!(!USER_TURN_TEXT.trim().is_empty());
        let msg = ChatMessage::user_with_images(USER_TURN_TEXT, vec![sample_image().to_image_data()]);
        assert_eq!(msg.content, USER_TURN_TEXT);
    }

    #[test]
    fn default_models_are_vision_capable() {
        assert_eq!(default_model_for("OpenAI"), "gpt-4.1-nano");
        assert_eq!(default_model_for("ollama"), "llava");
        assert_eq!(default_model_for("anthropic"), "claude-sonnet-4-20250514");
    }
}
