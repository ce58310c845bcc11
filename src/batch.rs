//! Batch orchestration: fan one analysis task out per image, then gather.
//!
//! Every image runs Encoder → Analysis Client in its own spawned task, all
//! issued at once with no concurrency cap. A task never fails: any read,
//! transport or schema error is turned into a degraded [`AnalysisResult`]
//! inside the task, so one bad scan cannot abort the others. The caller gets
//! the full list only after every task has settled.

use crate::config::ExtractionConfig;
use crate::error::{ImageError, NewsclipError};
use crate::export;
use crate::output::{AnalysisResult, Article, BatchOutput, BatchStats};
use crate::pipeline::analyze::{resolve_extractor, ArticleExtractor};
use crate::pipeline::encode::encode_image;
use crate::pipeline::input::{collect_images, UploadedImage};
use crate::pipeline::postprocess::clean_article;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Analyse a batch of images.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(BatchOutput)` with exactly one result per input image, in completion
/// order, even if some (or all) images failed. Check
/// `output.stats.failed`.
///
/// # Errors
/// * [`NewsclipError::EmptyBatch`] before anything else happens, including
///   extractor construction. No request is ever sent for an empty batch.
/// * [`NewsclipError::MissingCredential`] /
///   [`NewsclipError::ProviderNotConfigured`] when no extractor can be built.
/// * [`NewsclipError::BatchAborted`] if a task died outside its own error
///   handling. The remaining tasks still run to completion first.
pub async fn analyze_images(
    images: Vec<UploadedImage>,
    config: &ExtractionConfig,
) -> Result<BatchOutput, NewsclipError> {
    if images.is_empty() {
        return Err(NewsclipError::EmptyBatch);
    }

    let start = Instant::now();
    let extractor = resolve_extractor(config)?;
    let total = images.len();
    info!("Analysing {} image(s) with {}", total, extractor.name());

    let mut tasks = JoinSet::new();
    for image in images {
        tasks.spawn(analyze_one(
            Arc::clone(&extractor),
            image,
            config.folder_name.clone(),
            config.reflow,
        ));
    }

    let mut results = Vec::with_capacity(total);
    let mut aborted: Option<String> = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => {
                error!("Analysis task died: {}", e);
                aborted.get_or_insert_with(|| e.to_string());
            }
        }
    }

    if let Some(detail) = aborted {
        return Err(NewsclipError::BatchAborted { detail });
    }

    let stats = BatchStats::from_results(&results, start.elapsed().as_millis() as u64);
    info!(
        "Batch complete: {} found, {} not found, {} failed, {}ms",
        stats.found, stats.not_found, stats.failed, stats.total_duration_ms
    );

    Ok(BatchOutput { results, stats })
}

/// Collect images from files and directories, then analyse them.
pub async fn analyze_paths(
    inputs: &[PathBuf],
    config: &ExtractionConfig,
) -> Result<BatchOutput, NewsclipError> {
    let images = collect_images(inputs)?;
    analyze_images(images, config).await
}

/// Analyse images and write the CSV export to `output_path`.
///
/// The file is written atomically; a failed run never leaves a partial CSV.
pub async fn analyze_to_csv(
    inputs: &[PathBuf],
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<BatchOutput, NewsclipError> {
    let output = analyze_paths(inputs, config).await?;
    export::write_csv(output_path.as_ref(), &output.results)?;
    Ok(output)
}

/// Synchronous wrapper around [`analyze_images`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(
    images: Vec<UploadedImage>,
    config: &ExtractionConfig,
) -> Result<BatchOutput, NewsclipError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| NewsclipError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyze_images(images, config))
}

/// Run one image through the pipeline. Never fails: errors become a
/// degraded result carrying only the short user-facing message.
async fn analyze_one(
    extractor: Arc<dyn ArticleExtractor>,
    image: UploadedImage,
    folder_name: String,
    reflow: bool,
) -> AnalysisResult {
    let file_name = image.file_name.clone();
    let outcome = run_pipeline(extractor.as_ref(), image).await;

    match outcome {
        Ok(article) => {
            let article = if reflow { clean_article(article) } else { article };
            debug!("{}: \"{}\" ({} chars)", file_name, article.title, article.text.len());
            AnalysisResult::from_article(folder_name, file_name, article)
        }
        Err(e) => {
            warn!("{}", e);
            AnalysisResult::from_error(folder_name, &e)
        }
    }
}

/// Encoder → Analysis Client for a single image.
async fn run_pipeline(
    extractor: &dyn ArticleExtractor,
    image: UploadedImage,
) -> Result<Article, ImageError> {
    let encoded = encode_image(image).await?;
    extractor
        .extract(&encoded)
        .await
        .map_err(|f| ImageError::from_analysis(&encoded.file_name, f))
}
