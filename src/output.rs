//! Result types produced by a batch run.

use crate::error::ImageError;
use crate::prompts::{ERROR_TEXT_PREFIX, ERROR_TITLE, NOT_FOUND_TEXT, NOT_FOUND_TITLE};
use serde::{Deserialize, Serialize};

/// Title and body text of the article found in one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub text: String,
}

impl Article {
    /// The "subject not on this page" sentinel.
    pub fn not_found() -> Self {
        Self {
            title: NOT_FOUND_TITLE.to_string(),
            text: NOT_FOUND_TEXT.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.title == NOT_FOUND_TITLE && self.text == NOT_FOUND_TEXT
    }
}

/// One row of the results table: exactly one per submitted image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub folder_name: String,
    pub file_name: String,
    pub title: String,
    pub text: String,
}

impl AnalysisResult {
    pub fn from_article(
        folder_name: impl Into<String>,
        file_name: impl Into<String>,
        article: Article,
    ) -> Self {
        Self {
            folder_name: folder_name.into(),
            file_name: file_name.into(),
            title: article.title,
            text: article.text,
        }
    }

    /// Degraded row for an image whose pipeline failed. Only the short user
    /// message is embedded; the detail stays in the logs.
    pub fn from_error(folder_name: impl Into<String>, error: &ImageError) -> Self {
        Self {
            folder_name: folder_name.into(),
            file_name: error.file().to_string(),
            title: ERROR_TITLE.to_string(),
            text: format!("{ERROR_TEXT_PREFIX}{}", error.user_message()),
        }
    }

    pub fn status(&self) -> ResultStatus {
        if self.title == ERROR_TITLE && self.text.starts_with(ERROR_TEXT_PREFIX) {
            ResultStatus::Failed
        } else if self.title == NOT_FOUND_TITLE && self.text == NOT_FOUND_TEXT {
            ResultStatus::NotFound
        } else {
            ResultStatus::Found
        }
    }

    /// Whether the text is worth copying elsewhere (not a sentinel or error).
    pub fn is_copyable(&self) -> bool {
        !(self.text.starts_with(ERROR_TEXT_PREFIX) || self.text == NOT_FOUND_TEXT)
    }
}

/// Classification of a result row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Found,
    NotFound,
    Failed,
}

/// Aggregate counters for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_images: usize,
    pub found: usize,
    pub not_found: usize,
    pub failed: usize,
    pub total_duration_ms: u64,
}

impl BatchStats {
    pub fn from_results(results: &[AnalysisResult], total_duration_ms: u64) -> Self {
        let mut stats = BatchStats {
            total_images: results.len(),
            total_duration_ms,
            ..Default::default()
        };
        for r in results {
            match r.status() {
                ResultStatus::Found => stats.found += 1,
                ResultStatus::NotFound => stats.not_found += 1,
                ResultStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }
}

/// Everything a batch run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    /// One entry per submitted image, in completion order.
    pub results: Vec<AnalysisResult>,
    pub stats: BatchStats,
}
