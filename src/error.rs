//! Error types for the newsclip library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`NewsclipError`]: **fatal**: the batch cannot run at all (no API key,
//!   empty submission, unknown provider). Returned as `Err(NewsclipError)`
//!   from the top-level `analyze*` functions.
//!
//! * [`ImageError`]: **non-fatal**: a single image failed (unreadable file,
//!   transport error, malformed model reply) but every other image is fine.
//!   It is folded into a degraded [`crate::output::AnalysisResult`] so one bad
//!   scan never costs the user the rest of the batch.

use std::path::PathBuf;
use thiserror::Error;

/// Message shown to the user in place of any model-call failure. The real
/// cause is logged, never surfaced verbatim.
pub const MODEL_FAILURE_MESSAGE: &str = "Failed to get a response from the AI model.";

/// Message shown when an image file could not be read.
pub const READ_FAILURE_MESSAGE: &str = "Failed to read the image file.";

/// Advisory shown when the batch itself breaks outside the per-image handlers.
pub const BATCH_FAILURE_MESSAGE: &str =
    "An unexpected error occurred during analysis. Please check the logs.";

/// All fatal errors returned by the newsclip library.
///
/// Per-image failures use [`ImageError`] and end up inside the result list
/// rather than propagating here.
#[derive(Debug, Error)]
pub enum NewsclipError {
    // ── Startup errors ────────────────────────────────────────────────────
    /// No API key was configured for the Gemini backend.
    #[error("{var} environment variable not set.\nExport it or pass --api-key <KEY>.")]
    MissingCredential { var: String },

    /// A non-Gemini provider could not be initialised.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// The submission contained no images.
    #[error("Please select at least one image file.")]
    EmptyBatch,

    /// A directory given as input could not be walked.
    #[error("Failed to scan directory '{path}': {detail}")]
    ScanFailed { path: PathBuf, detail: String },

    // ── Batch errors ──────────────────────────────────────────────────────
    /// A per-image task died outside its own error handler (panic, abort).
    #[error("{}", BATCH_FAILURE_MESSAGE)]
    BatchAborted { detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Results could not be serialised to CSV.
    #[error("Failed to build CSV export: {0}")]
    ExportFailed(String),

    /// Could not create or write the output CSV file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure reported by an [`crate::pipeline::analyze::ArticleExtractor`].
///
/// The payload is the diagnostic detail for logs; it is not shown to users.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnalysisFailure {
    /// Network error, non-success HTTP status, or a blocked request.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The reply was not JSON or lacked the `title` / `text` fields.
    #[error("schema mismatch: {0}")]
    Schema(String),
}

/// A non-fatal error for a single image.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ImageError {
    /// The image bytes could not be read.
    #[error("{file}: read failed: {detail}")]
    ReadFailed { file: String, detail: String },

    /// The model endpoint could not be reached or rejected the request.
    #[error("{file}: model call failed: {detail}")]
    Transport { file: String, detail: String },

    /// The model replied, but not with the expected JSON object.
    #[error("{file}: unexpected model reply: {detail}")]
    Schema { file: String, detail: String },
}

impl ImageError {
    /// Attach a file name to an extractor failure.
    pub fn from_analysis(file: impl Into<String>, failure: AnalysisFailure) -> Self {
        let file = file.into();
        match failure {
            AnalysisFailure::Transport(detail) => ImageError::Transport { file, detail },
            AnalysisFailure::Schema(detail) => ImageError::Schema { file, detail },
        }
    }

    /// Short diagnostic suitable for the results table.
    pub fn user_message(&self) -> &'static str {
        match self {
            ImageError::ReadFailed { .. } => READ_FAILURE_MESSAGE,
            ImageError::Transport { .. } | ImageError::Schema { .. } => MODEL_FAILURE_MESSAGE,
        }
    }

    /// Name of the file the error belongs to.
    pub fn file(&self) -> &str {
        match self {
            ImageError::ReadFailed { file, .. }
            | ImageError::Transport { file, .. }
            | ImageError::Schema { file, .. } => file,
        }
    }
}
