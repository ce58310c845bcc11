//! # newsclip
//!
//! Find newspaper articles about a named subject in page scans, using Vision
//! Language Models (VLMs).
//!
//! ## Why this crate?
//!
//! Archive scans of newspaper pages are dense, multi-column and full of
//! unrelated content. Classic OCR returns the whole page in broken column
//! order. Instead each scan is sent to a VLM with a fixed instruction: locate
//! the article that mentions the subject, isolate it, pick its headline, and
//! return the body as clean paragraphs. The result is one `{title, text}`
//! row per image, ready to review or export as CSV.
//!
//! ## Pipeline Overview
//!
//! ```text
//! images / folders
//!  │
//!  ├─ 1. Input    collect files, detect MIME type
//!  ├─ 2. Encode   bytes → base64 + MIME
//!  ├─ 3. Analyze  one structured-output call per image, all concurrent
//!  ├─ 4. Polish   reflow paragraphs, strip fences
//!  └─ 5. Output   one AnalysisResult per image + CSV export
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use newsclip::{analyze_paths, ExtractionConfig};
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Gemini key read from GEMINI_API_KEY (or API_KEY)
//!     let config = ExtractionConfig::default();
//!     let output = analyze_paths(&[PathBuf::from("scans/")], &config).await?;
//!     for r in &output.results {
//!         println!("{}: {}", r.file_name, r.title);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `newsclip` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod export;
pub mod output;
pub mod pipeline;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{analyze_images, analyze_paths, analyze_sync, analyze_to_csv};
pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{AnalysisFailure, ImageError, NewsclipError};
pub use export::{parse_csv, to_csv, write_csv, ExportRow};
pub use output::{AnalysisResult, Article, BatchOutput, BatchStats, ResultStatus};
pub use pipeline::analyze::{resolve_extractor, ArticleExtractor, GeminiExtractor, LlmExtractor};
pub use pipeline::encode::{encode_image, EncodedImage};
pub use pipeline::input::{collect_images, ImageSource, UploadedImage};
pub use prompts::{Subject, NOT_FOUND_TEXT, NOT_FOUND_TITLE};
